//! Display list generation from laid-out boxes.

use crate::layout::LayoutBox;
use crate::text::TextMeasurer;
use crate::tree::NodeKind;
use kurbo::{Point, Rect, Size};
use peniko::Color;

/// Baseline position inside a line box, as a fraction of the font size.
const ASCENT: f64 = 0.8;

/// One drawing operation, in CSS pixels.
#[derive(Debug, Clone)]
pub enum PaintCommand {
    FillRect {
        rect: Rect,
        color: Color,
        radius: f64,
    },
    StrokeRect {
        rect: Rect,
        color: Color,
        width: f64,
        radius: f64,
        dashed: bool,
    },
    /// A single line of text starting at `baseline`.
    Text {
        baseline: Point,
        text: String,
        size: f64,
        color: Color,
    },
    /// An image cropped to cover `rect`.
    Image { rect: Rect, radius: f64, src: String },
}

/// Ordered drawing operations for one capture.
#[derive(Debug, Clone)]
pub struct DisplayList {
    pub size: Size,
    pub background: Color,
    pub commands: Vec<PaintCommand>,
}

impl DisplayList {
    /// Text of every text command, in paint order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                PaintCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Build the display list for a laid-out tree.
///
/// The list is positioned so the root box starts at the origin.
pub fn paint(root: &LayoutBox, measurer: &mut TextMeasurer, background: Color) -> DisplayList {
    let mut commands = Vec::new();
    let origin = root.rect.origin().to_vec2();
    paint_box(root, measurer, &mut commands);
    for cmd in &mut commands {
        match cmd {
            PaintCommand::FillRect { rect, .. }
            | PaintCommand::StrokeRect { rect, .. }
            | PaintCommand::Image { rect, .. } => *rect = *rect - origin,
            PaintCommand::Text { baseline, .. } => *baseline -= origin,
        }
    }
    DisplayList {
        size: root.rect.size(),
        background,
        commands,
    }
}

fn paint_box(b: &LayoutBox, measurer: &mut TextMeasurer, out: &mut Vec<PaintCommand>) {
    let radius = b.style.radius;
    if let Some(color) = b.background {
        out.push(PaintCommand::FillRect {
            rect: b.rect,
            color,
            radius,
        });
    }
    if let Some(border) = b.border {
        // Stroke centered inside the border box.
        let inset = border.width / 2.0;
        out.push(PaintCommand::StrokeRect {
            rect: b.rect.inset(-inset),
            color: border.color,
            width: border.width,
            radius: (radius - inset).max(0.0),
            dashed: border.dashed,
        });
    }

    match &b.kind {
        NodeKind::CardImage { src } => out.push(PaintCommand::Image {
            rect: b.content_rect(),
            radius,
            src: src.clone(),
        }),
        NodeKind::AddAffordance(label) => {
            let size = b.style.font.size;
            let width = measurer.measure(label, size);
            let center = b.rect.center();
            out.push(PaintCommand::Text {
                baseline: Point::new(center.x - width / 2.0, center.y - size / 2.0 + size * ASCENT),
                text: label.clone(),
                size,
                color: b.foreground,
            });
        }
        _ => {
            let content = b.content_rect();
            let font = b.style.font;
            let leading = (font.line_height - font.size) / 2.0;
            for (i, line) in b.lines.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let top = content.y0 + font.line_height * i as f64;
                out.push(PaintCommand::Text {
                    baseline: Point::new(content.x0, top + leading + font.size * ASCENT),
                    text: line.clone(),
                    size: font.size,
                    color: b.foreground,
                });
            }
        }
    }

    for child in &b.children {
        paint_box(child, measurer, out);
    }
}
