//! The live presentation and the capture targets derived from it.

use crate::export::ExportConfig;
use crate::tree::{RenderTree, build_canvas_tree};
use bmcmaker_core::canvas::CanvasSnapshot;

/// Live render tree plus the state shared with exports.
///
/// Holds the hide-add-affordances flag and at most one offscreen clone.
#[derive(Debug)]
pub struct Stage {
    live: RenderTree,
    offscreen: Option<RenderTree>,
    hide_affordances: bool,
    viewport_width: f64,
    offscreen_removals: usize,
}

impl Stage {
    pub fn new(live: RenderTree, viewport_width: f64) -> Self {
        Self {
            live,
            offscreen: None,
            hide_affordances: false,
            viewport_width,
            offscreen_removals: 0,
        }
    }

    pub fn from_snapshot(snapshot: &CanvasSnapshot, viewport_width: f64) -> Self {
        Self::new(build_canvas_tree(snapshot), viewport_width)
    }

    /// Rebuild the live tree after the snapshot changed.
    pub fn refresh(&mut self, snapshot: &CanvasSnapshot) {
        self.live = build_canvas_tree(snapshot);
    }

    pub fn live(&self) -> &RenderTree {
        &self.live
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    pub fn set_viewport_width(&mut self, width: f64) {
        self.viewport_width = width;
    }

    pub fn hide_affordances(&self) -> bool {
        self.hide_affordances
    }

    pub fn set_hide_affordances(&mut self, hide: bool) {
        self.hide_affordances = hide;
    }

    /// Whether an offscreen clone is currently attached.
    pub fn has_offscreen(&self) -> bool {
        self.offscreen.is_some()
    }

    /// How many offscreen clones have been removed so far.
    pub fn offscreen_removals(&self) -> usize {
        self.offscreen_removals
    }

    /// Choose the tree to capture.
    ///
    /// Narrow viewports get an offscreen clone normalized to the desktop
    /// presentation; wide ones capture the live tree directly.
    pub fn prepare_capture_target(&mut self, config: &ExportConfig) -> CaptureTarget<'_> {
        let offscreen = self.viewport_width < config.desktop_threshold;
        if offscreen {
            log::debug!(
                "Viewport {} below {}, capturing a {} px clone",
                self.viewport_width,
                config.desktop_threshold,
                config.canonical_width
            );
            self.offscreen = Some(self.live.desktop_clone(
                config.canonical_width,
                config.clone_bottom_padding,
                config.offscreen_left,
            ));
        }
        CaptureTarget {
            stage: self,
            offscreen,
            cleaned: false,
        }
    }
}

/// The tree an export captures. Cleans up its clone exactly once.
#[derive(Debug)]
pub struct CaptureTarget<'s> {
    stage: &'s mut Stage,
    offscreen: bool,
    cleaned: bool,
}

impl CaptureTarget<'_> {
    pub fn tree(&self) -> &RenderTree {
        self.stage
            .offscreen
            .as_ref()
            .filter(|_| self.offscreen)
            .unwrap_or(&self.stage.live)
    }

    pub fn is_offscreen(&self) -> bool {
        self.offscreen
    }

    pub fn viewport_width(&self) -> f64 {
        self.stage.viewport_width
    }

    pub fn hide_affordances(&self) -> bool {
        self.stage.hide_affordances
    }

    /// Detach the offscreen clone, if any. Later calls do nothing.
    pub fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        if self.offscreen && self.stage.offscreen.take().is_some() {
            self.stage.offscreen_removals += 1;
            log::debug!("Removed offscreen capture clone");
        }
    }
}

impl Drop for CaptureTarget<'_> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
