//! Fonts, text measurement and line breaking.
//!
//! Text is laid out with parley. Every font collection holds the bundled
//! DejaVu Sans, which also backs missing glyphs of other sources.

use parley::fontique::{Collection, CollectionOptions};
use parley::layout::PositionedLayoutItem;
use parley::{FontContext, FontStack, Layout, LayoutContext, StyleProperty};
use peniko::{Blob, FontData};
use std::borrow::Cow;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Embedded DejaVu Sans.
static DEJAVU_SANS: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Family name of the embedded font.
pub const EMBEDDED_FAMILY: &str = "DejaVu Sans";

/// Where the UI font comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FontSource {
    /// The embedded font only.
    #[default]
    Embedded,
    /// A font file, backed by the embedded font.
    Path(PathBuf),
    /// The system sans-serif font, backed by the embedded font.
    System,
}

/// Font loading errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FontError {
    #[error("Failed to read font {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error("{} contains no usable font", .0.display())]
    Unusable(PathBuf),
}

/// Fonts resolved from a [`FontSource`], with the family stack to use.
#[derive(Debug, Clone)]
pub struct FontSet {
    fonts: Vec<Blob<u8>>,
    stack: String,
    system: bool,
}

impl FontSet {
    pub fn embedded() -> Self {
        Self {
            fonts: vec![Blob::new(Arc::new(DEJAVU_SANS))],
            stack: quoted(EMBEDDED_FAMILY),
            system: false,
        }
    }

    pub fn resolve(source: &FontSource) -> Result<Self, FontError> {
        match source {
            FontSource::Embedded => Ok(Self::embedded()),
            FontSource::System => {
                let mut set = Self::embedded();
                set.stack = format!("sans-serif, {}", set.stack);
                set.system = true;
                Ok(set)
            }
            FontSource::Path(path) => {
                let bytes = fs::read(path).map_err(|e| FontError::Unreadable {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                let blob = Blob::new(Arc::new(bytes));
                let family = family_name(&blob).ok_or_else(|| FontError::Unusable(path.clone()))?;
                log::info!("Loaded font family {} from {}", family, path.display());

                let mut set = Self::embedded();
                set.fonts.insert(0, blob);
                set.stack = format!("{}, {}", quoted(&family), set.stack);
                Ok(set)
            }
        }
    }

    /// CSS-style family list, most preferred first.
    pub fn stack(&self) -> &str {
        &self.stack
    }
}

fn quoted(family: &str) -> String {
    format!("\"{family}\"")
}

/// Name of the first family in `blob`, if it holds a font at all.
fn family_name(blob: &Blob<u8>) -> Option<String> {
    let mut collection = Collection::new(CollectionOptions {
        system_fonts: false,
        ..Default::default()
    });
    let families = collection.register_fonts(blob.clone(), None);
    let (id, _) = families.first()?;
    collection.family_name(*id).map(str::to_string)
}

/// Shared, lazily resolved fonts.
#[derive(Debug)]
pub struct FontBook {
    source: FontSource,
    loaded: RwLock<Option<Result<FontSet, FontError>>>,
}

impl FontBook {
    pub fn new(source: FontSource) -> Self {
        Self {
            source,
            loaded: RwLock::new(None),
        }
    }

    /// Resolve the font source. The outcome is cached, errors included.
    pub fn load(&self) -> Result<FontSet, FontError> {
        if let Some(loaded) = self
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return loaded.clone();
        }

        let loaded = FontSet::resolve(&self.source);
        if let Err(e) = &loaded {
            log::warn!("{}", e);
        }
        *self.loaded.write().unwrap_or_else(PoisonError::into_inner) = Some(loaded.clone());
        loaded
    }

    /// Whether [`FontBook::load`] has completed.
    pub fn is_ready(&self) -> bool {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// A measurer over the loaded fonts.
    pub fn measurer(&self) -> Result<TextMeasurer, FontError> {
        self.load().map(|fonts| TextMeasurer::new(&fonts))
    }
}

/// A glyph positioned relative to the start of its line's baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedGlyph {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

/// Glyphs sharing one font and size.
#[derive(Debug, Clone)]
pub struct GlyphRun {
    pub font: FontData,
    pub size: f32,
    pub glyphs: Vec<PlacedGlyph>,
}

/// Measures, breaks and shapes text.
pub struct TextMeasurer {
    font_cx: FontContext,
    layout_cx: LayoutContext<[u8; 4]>,
    stack: String,
}

impl TextMeasurer {
    pub fn new(fonts: &FontSet) -> Self {
        let mut font_cx = FontContext::new();
        font_cx.collection = Collection::new(CollectionOptions {
            system_fonts: fonts.system,
            ..Default::default()
        });
        for blob in &fonts.fonts {
            font_cx.collection.register_fonts(blob.clone(), None);
        }
        Self {
            font_cx,
            layout_cx: LayoutContext::new(),
            stack: fonts.stack.clone(),
        }
    }

    /// Measurer over the embedded font.
    pub fn embedded() -> Self {
        Self::new(&FontSet::embedded())
    }

    fn layout(&mut self, text: &str, size: f64, max_width: Option<f64>) -> Layout<[u8; 4]> {
        let mut builder = self
            .layout_cx
            .ranged_builder(&mut self.font_cx, text, 1.0, false);
        builder.push_default(StyleProperty::FontSize(size as f32));
        builder.push_default(StyleProperty::FontStack(FontStack::Source(Cow::Borrowed(
            &self.stack,
        ))));
        let mut layout = builder.build(text);
        layout.break_all_lines(max_width.map(|w| w as f32));
        layout.align(None, parley::Alignment::Start, parley::AlignmentOptions::default());
        layout
    }

    /// Width of `text` on one line.
    pub fn measure(&mut self, text: &str, size: f64) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        self.layout(text, size, None).width() as f64
    }

    /// Break `text` into lines no wider than `max_width`.
    ///
    /// Explicit newlines always break. An empty input yields one empty line.
    pub fn wrap(&mut self, text: &str, size: f64, max_width: f64) -> Vec<String> {
        if text.is_empty() {
            return vec![String::new()];
        }
        let layout = self.layout(text, size, Some(max_width));
        let lines: Vec<String> = layout
            .lines()
            .filter_map(|line| text.get(line.text_range()))
            .map(|line| line.trim_end().to_string())
            .collect();
        if lines.is_empty() {
            vec![String::new()]
        } else {
            lines
        }
    }

    /// Shape one line of text for drawing.
    pub fn shape_line(&mut self, text: &str, size: f64) -> Vec<GlyphRun> {
        let layout = self.layout(text, size, None);
        let first_baseline = layout
            .lines()
            .next()
            .map(|line| line.metrics().baseline)
            .unwrap_or(0.0);

        let mut runs = Vec::new();
        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                let mut x = glyph_run.offset();
                let y = glyph_run.baseline() - first_baseline;
                let run = glyph_run.run();
                let glyphs = glyph_run
                    .glyphs()
                    .map(|glyph| {
                        let placed = PlacedGlyph {
                            id: glyph.id,
                            x: x + glyph.x,
                            y: y - glyph.y,
                        };
                        x += glyph.advance;
                        placed
                    })
                    .collect();
                runs.push(GlyphRun {
                    font: run.font().clone(),
                    size: run.font_size(),
                    glyphs,
                });
            }
        }
        runs
    }
}
