//! System clipboard.

use bmcmaker_core::{BoxFuture, Clipboard, ClipboardError};

/// The desktop clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl Clipboard for SystemClipboard {
    #[cfg(feature = "native")]
    fn write_text(&self, text: String) -> BoxFuture<'_, Result<(), ClipboardError>> {
        Box::pin(async move {
            let mut clipboard = arboard::Clipboard::new()
                .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            clipboard
                .set_text(text)
                .map_err(|e| ClipboardError::Denied(e.to_string()))?;
            log::debug!("Copied text to the system clipboard");
            Ok(())
        })
    }

    #[cfg(not(feature = "native"))]
    fn write_text(&self, _text: String) -> BoxFuture<'_, Result<(), ClipboardError>> {
        Box::pin(async {
            Err(ClipboardError::Unavailable(
                "built without clipboard support".to_string(),
            ))
        })
    }
}
