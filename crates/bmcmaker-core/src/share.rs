//! Share links.
//!
//! A share link is the app's own URL with the share payload in the `bmc`
//! query parameter. Building one copies it to the clipboard; loading one
//! merges whatever it carries into the store and otherwise does nothing.

use crate::canvas::CanvasSnapshot;
use crate::clipboard::{Clipboard, ClipboardError};
use crate::codec::{decode_share, encode_share};
use crate::store::CanvasStore;
use thiserror::Error;
use url::{Url, form_urlencoded};

/// Query parameter carrying the share payload.
pub const SHARE_PARAM: &str = "bmc";

/// Share link errors.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("Failed to encode share payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A freshly built share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    /// The full URL, always available even if the clipboard write failed.
    pub url: String,
    /// Whether images were stripped to keep the URL short.
    pub images_removed: bool,
    /// Set when the URL could not be copied.
    pub clipboard_error: Option<ClipboardError>,
}

impl ShareLink {
    /// Whether the URL made it to the clipboard.
    pub fn copied(&self) -> bool {
        self.clipboard_error.is_none()
    }
}

/// Result of loading a share link into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub images_removed: bool,
}

/// Builds share links and copies them to a clipboard.
pub struct ShareLinkService<C: Clipboard> {
    clipboard: C,
}

impl<C: Clipboard> ShareLinkService<C> {
    pub fn new(clipboard: C) -> Self {
        Self { clipboard }
    }

    /// The clipboard links are copied to.
    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    /// Build the share URL for `snapshot` and copy it to the clipboard.
    pub async fn build_share_url(
        &self,
        snapshot: &CanvasSnapshot,
        origin: &str,
        path: &str,
    ) -> Result<ShareLink, ShareError> {
        let (payload, images_removed) = encode_share(snapshot)?;
        let url = format!("{origin}{path}?{SHARE_PARAM}={payload}");

        let clipboard_error = match self.clipboard.write_text(url.clone()).await {
            Ok(()) => {
                log::info!("Share link copied ({} bytes)", url.len());
                None
            }
            Err(e) => {
                log::warn!("Failed to copy share link: {}", e);
                Some(e)
            }
        };

        Ok(ShareLink {
            url,
            images_removed,
            clipboard_error,
        })
    }
}

/// Pull the raw `bmc` value out of a full URL or a query string.
pub fn extract_share_param(input: &str) -> Option<String> {
    let input = input.trim();
    if let Ok(url) = Url::parse(input) {
        return url
            .query_pairs()
            .find(|(key, _)| key == SHARE_PARAM)
            .map(|(_, value)| value.into_owned());
    }
    let query = input.split_once('?').map_or(input, |(_, query)| query);
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == SHARE_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Load a share link into the store.
///
/// Returns `None` without touching the store when there is no payload, it
/// cannot be decoded, or it holds cards without a title.
pub fn load_from_url(store: &mut CanvasStore, input: &str) -> Option<LoadOutcome> {
    let Some(payload) = extract_share_param(input) else {
        log::debug!("No {} parameter present", SHARE_PARAM);
        return None;
    };
    match decode_share(&payload) {
        Ok(decoded) => {
            if let Err(e) = decoded.document.validate() {
                log::debug!("Ignoring share link: {}", e);
                return None;
            }
            let images_removed = decoded.images_removed;
            store.merge(decoded.document);
            log::info!("Loaded shared canvas (images removed: {})", images_removed);
            Some(LoadOutcome { images_removed })
        }
        Err(e) => {
            log::debug!("Ignoring share link: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Item, SectionId};
    use crate::clipboard::MemoryClipboard;

    const ORIGIN: &str = "https://bmc.example.com";

    fn plan(with_image: bool) -> CanvasSnapshot {
        let mut snapshot = CanvasSnapshot::new();
        snapshot.title = "My Plan".to_string();
        let mut item = Item::new("1", "Build MVP", "#ffffff");
        if with_image {
            item = item.with_image("data:image/png;base64,AAAA");
        }
        snapshot.push_item(SectionId::KeyActivities, item);
        snapshot
    }

    #[tokio::test]
    async fn test_build_share_url_copies_link() {
        let service = ShareLinkService::new(MemoryClipboard::new());
        let link = service.build_share_url(&plan(false), ORIGIN, "/").await.unwrap();

        assert!(link.url.starts_with("https://bmc.example.com/?bmc="));
        assert!(!link.images_removed);
        assert!(link.copied());
        assert_eq!(service.clipboard().contents(), Some(link.url.clone()));
    }

    #[tokio::test]
    async fn test_url_is_returned_when_images_removed() {
        let service = ShareLinkService::new(MemoryClipboard::new());
        let link = service.build_share_url(&plan(true), ORIGIN, "/app").await.unwrap();

        assert!(link.images_removed);
        assert!(link.url.starts_with("https://bmc.example.com/app?bmc="));
    }

    #[tokio::test]
    async fn test_clipboard_failure_keeps_url() {
        let service = ShareLinkService::new(MemoryClipboard::failing(ClipboardError::Denied(
            "permission".to_string(),
        )));
        let link = service.build_share_url(&plan(false), ORIGIN, "/").await.unwrap();

        assert!(!link.copied());
        assert!(link.url.contains("?bmc="));
    }

    #[tokio::test]
    async fn test_link_round_trip_into_store() {
        let service = ShareLinkService::new(MemoryClipboard::new());
        let link = service.build_share_url(&plan(true), ORIGIN, "/").await.unwrap();

        let mut store = CanvasStore::new();
        let outcome = load_from_url(&mut store, &link.url).unwrap();
        assert!(outcome.images_removed);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.title, "My Plan");
        let item = &snapshot.items(SectionId::KeyActivities)[0];
        assert_eq!(item.title, "Build MVP");
        assert_eq!(item.image_url, None);
    }

    #[tokio::test]
    async fn test_load_from_query_string() {
        let service = ShareLinkService::new(MemoryClipboard::new());
        let link = service.build_share_url(&plan(false), ORIGIN, "/").await.unwrap();
        let (_, query) = link.url.split_once('?').unwrap();

        let mut store = CanvasStore::new();
        assert!(load_from_url(&mut store, &format!("?{query}")).is_some());
        assert_eq!(store.snapshot(), &plan(false));
    }

    #[test]
    fn test_bad_link_is_silent_no_op() {
        let mut store = CanvasStore::new();
        store.set_title("Mine");
        let before = store.snapshot().clone();

        assert_eq!(load_from_url(&mut store, "https://bmc.example.com/?bmc=%%%garbage"), None);
        assert_eq!(load_from_url(&mut store, "https://bmc.example.com/?other=1"), None);
        assert_eq!(load_from_url(&mut store, ""), None);
        assert_eq!(store.snapshot(), &before);
    }

    #[test]
    fn test_untitled_cards_reject_the_link() {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;

        let mut store = CanvasStore::new();
        store.set_title("Mine");
        let before = store.snapshot().clone();

        let payload = STANDARD.encode(r#"{"data":{"customers":[{"id":"1","title":""}]},"title":"X"}"#);
        let url = format!("{ORIGIN}/?bmc={payload}");
        assert_eq!(load_from_url(&mut store, &url), None);
        assert_eq!(store.snapshot(), &before);
    }

    #[test]
    fn test_extract_share_param() {
        assert_eq!(extract_share_param("?a=1&bmc=abc").as_deref(), Some("abc"));
        assert_eq!(extract_share_param("bmc=a%2Bb").as_deref(), Some("a+b"));
        assert_eq!(
            extract_share_param("https://x.test/p?bmc=xyz#frag").as_deref(),
            Some("xyz")
        );
        assert_eq!(extract_share_param("https://x.test/p"), None);
    }
}
