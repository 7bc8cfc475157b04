//! Card image loading.
//!
//! Images are fetched once per export into an [`ImageCache`]. Every source
//! ends in a terminal state, loaded or failed; a failed image is drawn as a
//! placeholder rather than aborting the export.

use crate::BoxFuture;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use futures_util::future::join_all;
use image::RgbaImage;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Image loading errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("Invalid data URL")]
    InvalidDataUrl,
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Where an image reference points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Self-contained `data:` URL payload.
    Data(Vec<u8>),
    /// Remote `http(s)` URL.
    Remote(String),
    /// Local file.
    File(PathBuf),
}

impl ImageSource {
    /// Classify an image reference.
    pub fn parse(src: &str) -> Result<Self, ImageError> {
        let src = src.trim();
        if let Some(rest) = src.strip_prefix("data:") {
            let (meta, payload) = rest.split_once(',').ok_or(ImageError::InvalidDataUrl)?;
            let bytes = if meta.ends_with(";base64") {
                let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD
                    .decode(compact.as_bytes())
                    .or_else(|_| STANDARD_NO_PAD.decode(compact.as_bytes()))
                    .map_err(|_| ImageError::InvalidDataUrl)?
            } else {
                percent_decode_str(payload).collect()
            };
            return Ok(ImageSource::Data(bytes));
        }
        if src.starts_with("http://") || src.starts_with("https://") {
            return Ok(ImageSource::Remote(src.to_string()));
        }
        let path = src.strip_prefix("file://").unwrap_or(src);
        Ok(ImageSource::File(PathBuf::from(path)))
    }
}

/// Fetches encoded image bytes for a reference.
pub trait ImageLoader {
    fn load(&self, src: &str) -> BoxFuture<'_, Result<Vec<u8>, ImageError>>;
}

/// Loads data URLs, local files and remote URLs.
#[derive(Debug, Clone, Default)]
pub struct DefaultImageLoader {
    client: reqwest::Client,
}

impl DefaultImageLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageLoader for DefaultImageLoader {
    fn load(&self, src: &str) -> BoxFuture<'_, Result<Vec<u8>, ImageError>> {
        let source = ImageSource::parse(src);
        Box::pin(async move {
            match source? {
                ImageSource::Data(bytes) => Ok(bytes),
                ImageSource::File(path) => fs::read(&path)
                    .map_err(|e| ImageError::Io(format!("{}: {}", path.display(), e))),
                ImageSource::Remote(url) => {
                    let response = self
                        .client
                        .get(&url)
                        .send()
                        .await
                        .and_then(|r| r.error_for_status())
                        .map_err(|e| ImageError::Fetch(e.to_string()))?;
                    let bytes = response
                        .bytes()
                        .await
                        .map_err(|e| ImageError::Fetch(e.to_string()))?;
                    Ok(bytes.to_vec())
                }
            }
        })
    }
}

/// Terminal state of one image.
#[derive(Debug, Clone)]
pub enum ImageState {
    Loaded(Arc<RgbaImage>),
    Failed(ImageError),
}

/// Decoded images keyed by their reference.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: RwLock<HashMap<String, ImageState>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `src`, or `None` while it has not settled.
    pub fn get(&self, src: &str) -> Option<ImageState> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(src)
            .cloned()
    }

    /// Whether every source in `sources` has settled.
    pub fn all_settled(&self, sources: &[String]) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        sources.iter().all(|src| entries.contains_key(src))
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn insert(&self, src: String, state: ImageState) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(src, state);
    }

    /// Load every source that has not settled yet, concurrently.
    ///
    /// Completes once each has either decoded or failed.
    pub async fn load_all(&self, loader: &dyn ImageLoader, sources: &[String]) {
        let pending: Vec<&String> = sources.iter().filter(|src| self.get(src).is_none()).collect();
        if pending.is_empty() {
            return;
        }
        log::debug!("Loading {} images", pending.len());

        let results = join_all(pending.iter().map(|src| async move {
            let state = match loader.load(src).await {
                Ok(bytes) => match image::load_from_memory(&bytes) {
                    Ok(decoded) => ImageState::Loaded(Arc::new(decoded.to_rgba8())),
                    Err(e) => ImageState::Failed(ImageError::Decode(e.to_string())),
                },
                Err(e) => ImageState::Failed(e),
            };
            ((*src).clone(), state)
        }))
        .await;

        for (src, state) in results {
            if let ImageState::Failed(e) = &state {
                log::warn!("Image {} failed to load: {}", truncate(&src), e);
            }
            self.insert(src, state);
        }
    }
}

/// Shorten long references (data URLs) for log output.
fn truncate(src: &str) -> String {
    const MAX: usize = 64;
    if src.chars().count() <= MAX {
        src.to_string()
    } else {
        let head: String = src.chars().take(MAX).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    /// A 2x2 opaque red PNG.
    pub(crate) fn red_png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// Loader serving fixed bytes after a delay; unknown sources fail.
    pub(crate) struct SlowLoader {
        pub delay: Duration,
        pub images: HashMap<String, Vec<u8>>,
    }

    impl ImageLoader for SlowLoader {
        fn load(&self, src: &str) -> BoxFuture<'_, Result<Vec<u8>, ImageError>> {
            let result = self
                .images
                .get(src)
                .cloned()
                .ok_or_else(|| ImageError::Fetch(format!("404 {src}")));
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                result
            })
        }
    }

    #[test]
    fn test_parse_sources() {
        assert_eq!(
            ImageSource::parse("data:image/png;base64,AAAA").unwrap(),
            ImageSource::Data(vec![0, 0, 0])
        );
        assert_eq!(
            ImageSource::parse("https://example.com/a.png").unwrap(),
            ImageSource::Remote("https://example.com/a.png".to_string())
        );
        assert_eq!(
            ImageSource::parse("file:///tmp/a.png").unwrap(),
            ImageSource::File(PathBuf::from("/tmp/a.png"))
        );
        assert_eq!(
            ImageSource::parse("data:image/png;base64"),
            Err(ImageError::InvalidDataUrl)
        );
    }

    #[tokio::test]
    async fn test_default_loader_reads_data_urls() {
        let src = format!("data:image/png;base64,{}", STANDARD.encode(red_png()));
        let cache = ImageCache::new();
        cache.load_all(&DefaultImageLoader::new(), &[src.clone()]).await;

        match cache.get(&src) {
            Some(ImageState::Loaded(img)) => assert_eq!(img.dimensions(), (2, 2)),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failures_settle() {
        let loader = SlowLoader {
            delay: Duration::from_millis(5),
            images: HashMap::from([("ok".to_string(), red_png()), ("junk".to_string(), vec![1, 2, 3])]),
        };
        let sources = vec!["ok".to_string(), "junk".to_string(), "missing".to_string()];
        let cache = ImageCache::new();
        assert!(!cache.all_settled(&sources));

        cache.load_all(&loader, &sources).await;
        assert!(cache.all_settled(&sources));
        assert!(matches!(cache.get("ok"), Some(ImageState::Loaded(_))));
        assert!(matches!(cache.get("junk"), Some(ImageState::Failed(ImageError::Decode(_)))));
        assert!(matches!(cache.get("missing"), Some(ImageState::Failed(ImageError::Fetch(_)))));
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let cache = ImageCache::new();
        let src = "/nonexistent/bmcmaker/image.png".to_string();
        cache.load_all(&DefaultImageLoader::new(), &[src.clone()]).await;
        assert!(matches!(cache.get(&src), Some(ImageState::Failed(ImageError::Io(_)))));
    }
}
