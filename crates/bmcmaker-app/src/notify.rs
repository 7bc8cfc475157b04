//! User-visible notifications.

use bmcmaker_render::ExportFormat;
use std::fmt;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Level::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Level::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    pub fn canvas_cleared() -> Self {
        Self::success("Canvas cleared")
    }

    pub fn canvas_imported() -> Self {
        Self::success("Canvas imported successfully")
    }

    pub fn shared_canvas_loaded(images_removed: bool) -> Self {
        if images_removed {
            Self::success(
                "Shared canvas loaded - images were removed from the shared link to keep the URL short.",
            )
        } else {
            Self::success("Shared canvas loaded")
        }
    }

    pub fn share_link_copied(images_removed: bool) -> Self {
        if images_removed {
            Self::success(
                "Share link successfully - images were removed from the shared link to keep the URL short.",
            )
        } else {
            Self::success("Share link successfully")
        }
    }

    pub fn share_failed() -> Self {
        Self::error("Failed to create share link")
    }

    pub fn exported_json() -> Self {
        Self::success("Canvas exported as JSON")
    }

    pub fn generating(format: ExportFormat) -> Self {
        Self::info(format!("Generating {}...", format.label()))
    }

    pub fn exported(format: ExportFormat) -> Self {
        Self::success(format!("Canvas exported as {}", format.label()))
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            Level::Info => "info",
            Level::Success => "ok",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}
