//! Clipboard abstraction for share links.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Clipboard errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("Clipboard access denied: {0}")]
    Denied(String),
    #[error("Clipboard not available: {0}")]
    Unavailable(String),
}

/// Something text can be copied to.
///
/// Hosts implement this over the system clipboard; tests use
/// [`MemoryClipboard`].
pub trait Clipboard {
    /// Replace the clipboard contents with `text`.
    fn write_text(&self, text: String) -> BoxFuture<'_, Result<(), ClipboardError>>;
}

/// In-memory clipboard for testing and headless use.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    failure: Option<ClipboardError>,
}

impl MemoryClipboard {
    /// Create an empty clipboard that accepts writes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clipboard whose writes always fail with `error`.
    pub fn failing(error: ClipboardError) -> Self {
        Self {
            contents: Mutex::new(None),
            failure: Some(error),
        }
    }

    /// Last text written, if any.
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: String) -> BoxFuture<'_, Result<(), ClipboardError>> {
        Box::pin(async move {
            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
            *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(text);
            Ok(())
        })
    }
}
