//! BMC Maker Render Library
//!
//! Responsive layout of the canvas, readiness tracking and rasterization
//! to PDF and PNG artifacts. The default rasterizer draws on the CPU with
//! tiny-skia.

pub mod color;
pub mod encode;
pub mod export;
pub mod images;
pub mod layout;
pub mod paint;
pub mod readiness;
mod renderer;
mod skia_impl;
pub mod stage;
pub mod style;
pub mod text;
pub mod tree;

pub use bmcmaker_core::BoxFuture;

pub use encode::{Orientation, to_pdf, to_png};
pub use export::{ExportConfig, ExportError, ExportFormat, ExportGate, ExportResult, Exporter};
pub use images::{DefaultImageLoader, ImageCache, ImageError, ImageLoader};
pub use readiness::{ReadinessBarrier, ReadinessCheck, ReadinessError, ReadinessScope};
pub use renderer::{Bitmap, RasterContext, Rasterizer, RenderResult, RendererError};
pub use skia_impl::SkiaRasterizer;
pub use stage::{CaptureTarget, Stage};
pub use text::{FontBook, FontError, FontSet, FontSource};
pub use tree::{RenderTree, build_canvas_tree};
