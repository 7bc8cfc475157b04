//! Rasterizer trait abstraction.

use crate::images::ImageCache;
use crate::paint::DisplayList;
use crate::text::FontSet;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendererError {
    #[error("Invalid raster size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("No fonts available to draw text")]
    MissingFonts,
    #[error("No glyphs produced for {0:?}")]
    MissingGlyphs(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// An opaque raster, straight (non-premultiplied) RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// RGBA of the pixel at `(x, y)`, if inside the bitmap.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        self.pixels.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Context for rasterizing one display list.
pub struct RasterContext<'a> {
    /// What to draw.
    pub display: &'a DisplayList,
    /// Settled images referenced by the display list.
    pub images: &'a ImageCache,
    /// Fonts for glyphs. Required when the display list has text.
    pub fonts: Option<FontSet>,
    /// Device pixel ratio.
    pub scale_factor: f64,
    /// Transparent regions are resolved against this color.
    pub background_color: Color,
}

impl<'a> RasterContext<'a> {
    pub fn new(display: &'a DisplayList, images: &'a ImageCache) -> Self {
        Self {
            display,
            images,
            fonts: None,
            scale_factor: 1.0,
            background_color: display.background,
        }
    }

    /// Set the scale factor.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_fonts(mut self, fonts: FontSet) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// Device pixel size of the output.
    pub fn pixel_size(&self) -> (u32, u32) {
        let scale = self.scale_factor.max(0.0);
        (
            (self.display.size.width * scale).ceil() as u32,
            (self.display.size.height * scale).ceil() as u32,
        )
    }
}

/// Trait for rasterization backends.
pub trait Rasterizer {
    /// Draw the display list into an opaque bitmap.
    fn rasterize(&mut self, ctx: &RasterContext) -> RenderResult<Bitmap>;
}
