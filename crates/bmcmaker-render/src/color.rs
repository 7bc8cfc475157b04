//! Hex color parsing.

use peniko::Color;

/// Parse a CSS hex color: `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_color(s: &str) -> Option<Color> {
    let hex = s.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 17;
            }
            Some(Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255))
        }
        6 => Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, 255)),
        8 => Some(Color::from_rgba8(
            channel(0)?,
            channel(2)?,
            channel(4)?,
            channel(6)?,
        )),
        _ => None,
    }
}

/// Parse a color, logging and falling back to `fallback` when invalid.
pub fn parse_color_or(s: &str, fallback: Color) -> Color {
    parse_color(s).unwrap_or_else(|| {
        log::warn!("Invalid color {:?}, using fallback", s);
        fallback
    })
}

/// Straight RGBA bytes of a color.
pub fn to_rgba8(color: Color) -> [u8; 4] {
    let c = color.to_rgba8();
    [c.r, c.g, c.b, c.a]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#f5f3ed").map(to_rgba8), Some([0xf5, 0xf3, 0xed, 255]));
        assert_eq!(parse_color("#fff").map(to_rgba8), Some([255, 255, 255, 255]));
        assert_eq!(parse_color("#00000080").map(to_rgba8), Some([0, 0, 0, 0x80]));
        assert!(parse_color("f5f3ed").is_none());
        assert!(parse_color("#zzzzzz").is_none());
        assert!(parse_color("#ééé").is_none());
    }

    #[test]
    fn test_parse_color_or_falls_back() {
        let fallback = Color::from_rgba8(1, 2, 3, 255);
        assert_eq!(to_rgba8(parse_color_or("red", fallback)), [1, 2, 3, 255]);
    }
}
