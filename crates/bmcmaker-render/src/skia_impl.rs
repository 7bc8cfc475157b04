//! CPU rasterizer backed by tiny-skia. Text is shaped with parley and
//! scaled with swash.

use crate::color::to_rgba8;
use crate::images::ImageState;
use crate::paint::PaintCommand;
use crate::renderer::{Bitmap, RasterContext, Rasterizer, RenderResult, RendererError};
use crate::text::{GlyphRun, TextMeasurer};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use kurbo::{PathEl, Point, Rect, RoundedRect, Shape};
use swash::FontRef;
use swash::scale::{Render, ScaleContext, Source};
use swash::zeno::{Format, Vector};
use tiny_skia::{
    FillRule, FilterQuality, IntSize, Paint, Path, PathBuilder, Pattern, Pixmap, SpreadMode,
    Stroke, StrokeDash, Transform,
};

/// Drawn where an image failed to load.
const PLACEHOLDER: [u8; 4] = [243, 244, 246, 255];

/// Rasterizer drawing into a tiny-skia pixmap.
pub struct SkiaRasterizer {
    scale: ScaleContext,
}

impl Default for SkiaRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SkiaRasterizer {
    pub fn new() -> Self {
        Self {
            scale: ScaleContext::new(),
        }
    }

    /// Draw shaped glyphs with their line starting at `origin`, in device pixels.
    fn draw_glyphs(
        &mut self,
        pixmap: &mut Pixmap,
        runs: &[GlyphRun],
        origin: Point,
        color: [u8; 4],
    ) -> usize {
        let width = pixmap.width() as i32;
        let height = pixmap.height() as i32;
        let data = pixmap.data_mut();
        let color_alpha = color[3] as f32 / 255.0;
        let mut drawn = 0;

        for run in runs {
            let Some(font) = FontRef::from_index(run.font.data.data(), run.font.index as usize)
            else {
                continue;
            };
            let mut scaler = self.scale.builder(font).size(run.size).build();

            for glyph in &run.glyphs {
                let Ok(id) = u16::try_from(glyph.id) else {
                    continue;
                };
                let x = origin.x as f32 + glyph.x;
                let y = origin.y as f32 + glyph.y;
                let rendered = Render::new(&[Source::Outline])
                    .format(Format::Alpha)
                    .offset(Vector::new(x.fract(), y.fract()))
                    .render(&mut scaler, id);
                drawn += 1;

                let Some(mask) = rendered else {
                    continue;
                };
                let left = x.floor() as i32 + mask.placement.left;
                let top = y.floor() as i32 - mask.placement.top;
                for py in 0..mask.placement.height as i32 {
                    for px in 0..mask.placement.width as i32 {
                        let (dx, dy) = (left + px, top + py);
                        if dx < 0 || dy < 0 || dx >= width || dy >= height {
                            continue;
                        }
                        let coverage = mask.data[(py * mask.placement.width as i32 + px) as usize];
                        if coverage == 0 {
                            continue;
                        }
                        let a = coverage as f32 / 255.0 * color_alpha;
                        let i = ((dy * width + dx) * 4) as usize;
                        blend_premultiplied(&mut data[i..i + 4], color, a);
                    }
                }
            }
        }
        drawn
    }
}

/// Source-over of a straight color with coverage `a` onto a premultiplied pixel.
fn blend_premultiplied(dst: &mut [u8], color: [u8; 4], a: f32) {
    let inv = 1.0 - a;
    for c in 0..3 {
        dst[c] = (color[c] as f32 * a + dst[c] as f32 * inv).round() as u8;
    }
    dst[3] = (255.0 * a + dst[3] as f32 * inv).round() as u8;
}

/// Convert a kurbo shape to a tiny-skia path.
fn to_path(shape: &impl Shape) -> Option<Path> {
    let mut pb = PathBuilder::new();
    for el in shape.path_elements(0.1) {
        match el {
            PathEl::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(p1, p2) => {
                pb.quad_to(p1.x as f32, p1.y as f32, p2.x as f32, p2.y as f32)
            }
            PathEl::CurveTo(p1, p2, p3) => pb.cubic_to(
                p1.x as f32,
                p1.y as f32,
                p2.x as f32,
                p2.y as f32,
                p3.x as f32,
                p3.y as f32,
            ),
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

fn box_path(rect: Rect, radius: f64) -> Option<Path> {
    let radius = radius.min(rect.width() / 2.0).min(rect.height() / 2.0).max(0.0);
    if radius > 0.0 {
        to_path(&RoundedRect::from_rect(rect, radius))
    } else {
        to_path(&rect)
    }
}

fn solid(color: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = true;
    paint
}

/// Scale and center-crop `img` so it exactly covers `width` x `height`.
fn cover(img: &RgbaImage, width: u32, height: u32) -> Option<RgbaImage> {
    let (iw, ih) = img.dimensions();
    if iw == 0 || ih == 0 || width == 0 || height == 0 {
        return None;
    }
    let factor = (width as f64 / iw as f64).max(height as f64 / ih as f64);
    let sw = ((iw as f64 * factor).ceil() as u32).max(width);
    let sh = ((ih as f64 * factor).ceil() as u32).max(height);
    let resized = imageops::resize(img, sw, sh, FilterType::Triangle);
    Some(imageops::crop_imm(&resized, (sw - width) / 2, (sh - height) / 2, width, height).to_image())
}

/// Premultiplied pixmap of a straight RGBA image.
fn to_pixmap(img: RgbaImage) -> Option<Pixmap> {
    let (w, h) = img.dimensions();
    let mut data = img.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, IntSize::from_wh(w, h)?)
}

impl Rasterizer for SkiaRasterizer {
    fn rasterize(&mut self, ctx: &RasterContext) -> RenderResult<Bitmap> {
        let (width, height) = ctx.pixel_size();
        let mut pixmap =
            Pixmap::new(width, height).ok_or(RendererError::InvalidSize { width, height })?;

        let [r, g, b, _] = to_rgba8(ctx.background_color);
        pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, 255));

        let s = ctx.scale_factor;
        let identity = Transform::identity();
        let mut measurer: Option<TextMeasurer> = None;

        for cmd in &ctx.display.commands {
            match cmd {
                PaintCommand::FillRect { rect, color, radius } => {
                    if let Some(path) = box_path(rect.scale_from_origin(s), radius * s) {
                        pixmap.fill_path(&path, &solid(to_rgba8(*color)), FillRule::Winding, identity, None);
                    }
                }
                PaintCommand::StrokeRect {
                    rect,
                    color,
                    width,
                    radius,
                    dashed,
                } => {
                    let Some(path) = box_path(rect.scale_from_origin(s), radius * s) else {
                        continue;
                    };
                    let mut stroke = Stroke {
                        width: (width * s) as f32,
                        ..Default::default()
                    };
                    if *dashed {
                        let dash = (4.0 * width * s) as f32;
                        stroke.dash = StrokeDash::new(vec![dash, dash], 0.0);
                    }
                    pixmap.stroke_path(&path, &solid(to_rgba8(*color)), &stroke, identity, None);
                }
                PaintCommand::Image { rect, radius, src } => {
                    let device = rect.scale_from_origin(s);
                    let Some(path) = box_path(device, radius * s) else {
                        continue;
                    };
                    let tile = match ctx.images.get(src) {
                        Some(ImageState::Loaded(img)) => cover(
                            &img,
                            device.width().round() as u32,
                            device.height().round() as u32,
                        )
                        .and_then(to_pixmap),
                        _ => None,
                    };
                    match tile {
                        Some(tile) => {
                            let mut paint = Paint::default();
                            paint.anti_alias = true;
                            paint.shader = Pattern::new(
                                tile.as_ref(),
                                SpreadMode::Pad,
                                FilterQuality::Bilinear,
                                1.0,
                                Transform::from_translate(device.x0 as f32, device.y0 as f32),
                            );
                            pixmap.fill_path(&path, &paint, FillRule::Winding, identity, None);
                        }
                        None => {
                            pixmap.fill_path(&path, &solid(PLACEHOLDER), FillRule::Winding, identity, None);
                        }
                    }
                }
                PaintCommand::Text {
                    baseline,
                    text,
                    size,
                    color,
                } => {
                    let fonts = ctx.fonts.as_ref().ok_or(RendererError::MissingFonts)?;
                    let measurer = measurer.get_or_insert_with(|| TextMeasurer::new(fonts));
                    let runs = measurer.shape_line(text, size * s);
                    let drawn = self.draw_glyphs(
                        &mut pixmap,
                        &runs,
                        Point::new(baseline.x * s, baseline.y * s),
                        to_rgba8(*color),
                    );
                    if drawn == 0 && !text.trim().is_empty() {
                        return Err(RendererError::MissingGlyphs(text.clone()));
                    }
                }
            }
        }

        let pixels = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        Ok(Bitmap {
            width,
            height,
            pixels,
        })
    }
}
