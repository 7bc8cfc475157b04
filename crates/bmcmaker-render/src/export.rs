//! Canvas export to PDF and PNG.
//!
//! An export hides the add affordances, picks a capture target, waits for
//! the render to settle, then lays out, rasterizes and encodes the target.
//! The stage is restored whether the export succeeds, fails or is dropped.

use crate::encode::{to_pdf, to_png};
use crate::images::{DefaultImageLoader, ImageCache, ImageLoader};
use crate::layout::LayoutEngine;
use crate::paint::paint;
use crate::readiness::{
    FontsReady, FrameClock, FrameTicks, GraceDelay, ImagesSettled, IntervalFrameClock,
    ReadinessBarrier, ReadinessError, ReadinessScope,
};
use crate::renderer::{RasterContext, Rasterizer, RendererError};
use crate::skia_impl::SkiaRasterizer;
use crate::stage::Stage;
use crate::text::{FontBook, FontError, FontSource, TextMeasurer};
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("An export is already in progress")]
    Busy,
    #[error(transparent)]
    Timeout(#[from] ReadinessError),
    #[error("Font unavailable: {0}")]
    Font(#[from] FontError),
    #[error("Render failed: {0}")]
    Render(#[from] RendererError),
    #[error("Encoding failed: {0}")]
    Encode(RendererError),
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Png,
}

impl ExportFormat {
    /// Default file name of the artifact.
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "bmc-canvas.pdf",
            ExportFormat::Png => "bmc-canvas.png",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "PDF",
            ExportFormat::Png => "PNG",
        }
    }
}

/// Export settings.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Viewports narrower than this are captured through a desktop clone.
    pub desktop_threshold: f64,
    /// Width of the desktop clone.
    pub canonical_width: f64,
    /// Bottom padding of the desktop clone.
    pub clone_bottom_padding: f64,
    /// Horizontal position of the clone, outside the viewport.
    pub offscreen_left: f64,
    /// Device pixels per CSS pixel.
    pub scale: f64,
    /// Frame boundaries to wait for after images settle.
    pub frames: u32,
    pub grace_delay: Duration,
    /// Pause after hiding the affordances, before capturing.
    pub settle_delay: Duration,
    /// Upper bound on the readiness wait.
    pub deadline: Duration,
    pub font_source: FontSource,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            desktop_threshold: 1024.0,
            canonical_width: 1200.0,
            clone_bottom_padding: 40.0,
            offscreen_left: -9999.0,
            scale: 2.0,
            frames: 2,
            grace_delay: Duration::from_millis(30),
            settle_delay: Duration::from_millis(100),
            deadline: Duration::from_secs(10),
            font_source: FontSource::System,
        }
    }
}

impl ExportConfig {
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_font_source(mut self, source: FontSource) -> Self {
        self.font_source = source;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set both the settle and grace delays.
    pub fn with_delays(mut self, settle: Duration, grace: Duration) -> Self {
        self.settle_delay = settle;
        self.grace_delay = grace;
        self
    }
}

/// Rejects overlapping exports.
#[derive(Debug, Default)]
pub struct ExportGate {
    busy: AtomicBool,
}

impl ExportGate {
    pub fn try_acquire(&self) -> Option<ExportPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ExportPermit { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one export.
#[derive(Debug)]
pub struct ExportPermit<'a> {
    gate: &'a ExportGate,
}

impl Drop for ExportPermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Hides the affordances and restores the previous flag on drop.
struct HiddenAffordances<'s> {
    stage: &'s mut Stage,
    previous: bool,
}

impl<'s> HiddenAffordances<'s> {
    fn new(stage: &'s mut Stage) -> Self {
        let previous = stage.hide_affordances();
        stage.set_hide_affordances(true);
        Self { stage, previous }
    }
}

impl Deref for HiddenAffordances<'_> {
    type Target = Stage;

    fn deref(&self) -> &Stage {
        self.stage
    }
}

impl DerefMut for HiddenAffordances<'_> {
    fn deref_mut(&mut self) -> &mut Stage {
        self.stage
    }
}

impl Drop for HiddenAffordances<'_> {
    fn drop(&mut self) {
        self.stage.set_hide_affordances(self.previous);
    }
}

/// Produces PDF and PNG artifacts from a stage.
pub struct Exporter {
    config: ExportConfig,
    fonts: Arc<FontBook>,
    images: Arc<ImageCache>,
    loader: Arc<dyn ImageLoader>,
    clock: Arc<dyn FrameClock>,
    rasterizer: RefCell<Box<dyn Rasterizer>>,
    gate: ExportGate,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        let fonts = Arc::new(FontBook::new(config.font_source.clone()));
        Self {
            config,
            fonts,
            images: Arc::new(ImageCache::new()),
            loader: Arc::new(DefaultImageLoader::new()),
            clock: Arc::new(IntervalFrameClock::default()),
            rasterizer: RefCell::new(Box::new(SkiaRasterizer::new())),
            gate: ExportGate::default(),
        }
    }

    pub fn with_image_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_frame_clock(mut self, clock: Arc<dyn FrameClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Box<dyn Rasterizer>) -> Self {
        self.rasterizer = RefCell::new(rasterizer);
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Readiness checks in the order they must resolve.
    pub fn barrier(&self) -> ReadinessBarrier {
        ReadinessBarrier::new()
            .with_check(FontsReady {
                fonts: self.fonts.clone(),
            })
            .with_check(ImagesSettled {
                cache: self.images.clone(),
                loader: self.loader.clone(),
            })
            .with_check(FrameTicks {
                clock: self.clock.clone(),
                frames: self.config.frames,
            })
            .with_check(GraceDelay {
                delay: self.config.grace_delay,
            })
            .with_deadline(self.config.deadline)
    }

    /// Export the stage as `format`.
    ///
    /// Rejected with [`ExportError::Busy`] while another export runs.
    pub async fn export_artifact(
        &self,
        stage: &mut Stage,
        format: ExportFormat,
    ) -> ExportResult<Vec<u8>> {
        let Some(_permit) = self.gate.try_acquire() else {
            log::warn!("Export requested while another export is running");
            return Err(ExportError::Busy);
        };
        log::info!("Exporting canvas as {}", format.label());
        self.images.clear();

        let mut stage = HiddenAffordances::new(stage);
        tokio::time::sleep(self.config.settle_delay).await;

        let result = self.capture(&mut stage, format).await;
        self.images.clear();
        match &result {
            Ok(bytes) => log::info!("{} export complete: {} bytes", format.label(), bytes.len()),
            Err(e) => log::error!("{} export failed: {}", format.label(), e),
        }
        result
    }

    async fn capture(&self, stage: &mut Stage, format: ExportFormat) -> ExportResult<Vec<u8>> {
        let mut target = stage.prepare_capture_target(&self.config);
        let scope = ReadinessScope {
            image_sources: target.tree().image_sources(),
        };
        self.barrier().wait(&scope).await?;

        let fonts = self.fonts.load()?;
        let mut measurer = TextMeasurer::new(&fonts);
        let root = LayoutEngine::new(&mut measurer)
            .with_hidden_affordances(target.hide_affordances())
            .layout(target.tree(), target.viewport_width());
        let background = target.tree().background();
        let display = paint(&root, &mut measurer, background);

        let ctx = RasterContext::new(&display, &self.images)
            .with_scale_factor(self.config.scale)
            .with_background(background)
            .with_fonts(fonts);
        let bitmap = self.rasterizer.borrow_mut().rasterize(&ctx)?;
        log::debug!("Rasterized {}x{}", bitmap.width, bitmap.height);

        let bytes = match format {
            ExportFormat::Pdf => to_pdf(&bitmap),
            ExportFormat::Png => to_png(&bitmap),
        }
        .map_err(ExportError::Encode)?;

        target.cleanup();
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxFuture;
    use crate::images::ImageError;
    use crate::images::tests::{SlowLoader, red_png};
    use crate::renderer::{Bitmap, RenderResult};
    use bmcmaker_core::canvas::{CanvasSnapshot, Item, SectionId};
    use lopdf::Document;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ImmediateClock;

    impl FrameClock for ImmediateClock {
        fn next_frame(&self) -> BoxFuture<'_, ()> {
            Box::pin(async {})
        }
    }

    struct FailingRasterizer;

    impl Rasterizer for FailingRasterizer {
        fn rasterize(&mut self, _ctx: &RasterContext) -> RenderResult<Bitmap> {
            Err(RendererError::RenderFailed("no surface".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingLoader {
        calls: AtomicUsize,
    }

    impl ImageLoader for CountingLoader {
        fn load(&self, src: &str) -> BoxFuture<'_, Result<Vec<u8>, ImageError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let src = src.to_string();
            Box::pin(async move { Err(ImageError::Fetch(format!("offline: {src}"))) })
        }
    }

    fn config() -> ExportConfig {
        ExportConfig::default()
            .with_font_source(FontSource::Embedded)
            .with_scale(1.0)
            .with_delays(Duration::ZERO, Duration::ZERO)
    }

    fn exporter(config: ExportConfig, delay: Duration) -> Exporter {
        let loader = SlowLoader {
            delay,
            images: HashMap::from([("logo.png".to_string(), red_png())]),
        };
        Exporter::new(config)
            .with_image_loader(Arc::new(loader))
            .with_frame_clock(Arc::new(ImmediateClock))
    }

    fn snapshot() -> CanvasSnapshot {
        let mut snapshot = CanvasSnapshot::new();
        snapshot.title = "My Plan".to_string();
        snapshot.push_item(
            SectionId::KeyActivities,
            Item::new("1", "Build MVP", "#ffffff").with_image("logo.png"),
        );
        snapshot.push_item(
            SectionId::Customers,
            Item::new("2", "Makers", "#9dc8ac").with_image("missing.png"),
        );
        snapshot
    }

    #[tokio::test]
    async fn test_desktop_png_export() {
        let exporter = exporter(config().with_scale(2.0), Duration::from_millis(5));
        let mut stage = Stage::from_snapshot(&snapshot(), 1280.0);

        let bytes = exporter
            .export_artifact(&mut stage, ExportFormat::Png)
            .await
            .unwrap();
        let png = image::load_from_memory(&bytes).unwrap();
        assert_eq!(png.width(), 2560);
        assert!(!stage.hide_affordances());
        assert!(!exporter.is_busy());
    }

    #[tokio::test]
    async fn test_mobile_pdf_export_uses_desktop_clone() {
        let exporter = exporter(config(), Duration::ZERO);
        let mut stage = Stage::from_snapshot(&snapshot(), 375.0);

        let bytes = exporter
            .export_artifact(&mut stage, ExportFormat::Pdf)
            .await
            .unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let media_box = doc
            .get_object(page_id)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(media_box[2].as_i64().unwrap(), 1200);

        assert!(!stage.has_offscreen());
        assert_eq!(stage.offscreen_removals(), 1);
        assert!(!stage.hide_affordances());
        assert_eq!(stage.live().fixed_width, None);
    }

    #[tokio::test]
    async fn test_each_export_fetches_images_again() {
        let loader = Arc::new(CountingLoader::default());
        let exporter = Exporter::new(config())
            .with_image_loader(loader.clone())
            .with_frame_clock(Arc::new(ImmediateClock));
        let mut stage = Stage::from_snapshot(&snapshot(), 1280.0);

        exporter
            .export_artifact(&mut stage, ExportFormat::Png)
            .await
            .unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        assert!(exporter.images.get("missing.png").is_none());

        exporter
            .export_artifact(&mut stage, ExportFormat::Png)
            .await
            .unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_render_failure_restores_stage() {
        let exporter =
            exporter(config(), Duration::ZERO).with_rasterizer(Box::new(FailingRasterizer));
        let mut stage = Stage::from_snapshot(&snapshot(), 375.0);

        let err = exporter
            .export_artifact(&mut stage, ExportFormat::Png)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Render(_)));
        assert!(!stage.hide_affordances());
        assert!(!stage.has_offscreen());
        assert_eq!(stage.offscreen_removals(), 1);
        assert!(!exporter.is_busy());
    }

    #[tokio::test]
    async fn test_previous_flag_is_restored() {
        let exporter =
            exporter(config(), Duration::ZERO).with_rasterizer(Box::new(FailingRasterizer));
        let mut stage = Stage::from_snapshot(&snapshot(), 1280.0);
        stage.set_hide_affordances(true);

        let _ = exporter.export_artifact(&mut stage, ExportFormat::Pdf).await;
        assert!(stage.hide_affordances());
    }

    #[tokio::test]
    async fn test_hung_image_times_out() {
        let exporter = exporter(
            config().with_deadline(Duration::from_millis(50)),
            Duration::from_secs(60),
        );
        let mut stage = Stage::from_snapshot(&snapshot(), 375.0);

        let err = exporter
            .export_artifact(&mut stage, ExportFormat::Png)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::Timeout(ReadinessError::Timeout { check: "images", .. })
        ));
        assert!(!stage.hide_affordances());
        assert!(!stage.has_offscreen());
    }

    #[tokio::test]
    async fn test_overlapping_export_is_busy() {
        let exporter = exporter(config(), Duration::from_millis(50));
        let mut first = Stage::from_snapshot(&snapshot(), 1280.0);
        let mut second = Stage::from_snapshot(&snapshot(), 1280.0);

        let (a, b) = tokio::join!(
            exporter.export_artifact(&mut first, ExportFormat::Png),
            exporter.export_artifact(&mut second, ExportFormat::Png),
        );
        assert!(a.is_ok());
        assert!(matches!(b, Err(ExportError::Busy)));
        assert!(!second.hide_affordances());

        // The gate reopens once the first export finished.
        assert!(
            exporter
                .export_artifact(&mut second, ExportFormat::Png)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_text_reaches_the_artifact() {
        let exporter = exporter(config(), Duration::ZERO);
        let mut first = Stage::from_snapshot(&snapshot(), 1280.0);
        let mut renamed = snapshot();
        renamed.title = "Other Plan".to_string();
        let mut second = Stage::from_snapshot(&renamed, 1280.0);

        let a = exporter
            .export_artifact(&mut first, ExportFormat::Png)
            .await
            .unwrap();
        let b = exporter
            .export_artifact(&mut second, ExportFormat::Png)
            .await
            .unwrap();
        let a = image::load_from_memory(&a).unwrap().to_rgba8();
        let b = image::load_from_memory(&b).unwrap().to_rgba8();
        assert_eq!(a.dimensions(), b.dimensions());
        assert_ne!(a.as_raw(), b.as_raw());
    }

    #[tokio::test]
    async fn test_missing_font_file_fails_export() {
        let config = config().with_font_source(FontSource::Path("/nonexistent/font.ttf".into()));
        let exporter = exporter(config, Duration::ZERO);
        let mut stage = Stage::from_snapshot(&snapshot(), 375.0);

        let err = exporter
            .export_artifact(&mut stage, ExportFormat::Png)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Font(FontError::Unreadable { .. })));
        assert!(!stage.hide_affordances());
        assert!(!stage.has_offscreen());
        assert!(!exporter.is_busy());
    }

    #[test]
    fn test_gate_releases_on_drop() {
        let gate = ExportGate::default();
        let permit = gate.try_acquire();
        assert!(permit.is_some());
        assert!(gate.try_acquire().is_none());
        drop(permit);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_format_names() {
        assert_eq!(ExportFormat::Pdf.file_name(), "bmc-canvas.pdf");
        assert_eq!(ExportFormat::Png.file_name(), "bmc-canvas.png");
    }
}
