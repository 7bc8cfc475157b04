//! Share payload encoding.
//!
//! A share payload is the snapshot without images, serialized compactly,
//! base64-encoded (the inner encoding) and then percent-encoded as a URI
//! component (the outer, transport encoding).
//!
//! Browsers, chat clients and link-preview crawlers do not agree on how to
//! treat query strings, so decoding walks an ordered list of strategies and
//! takes the first that yields a JSON object.

use super::CanvasDocument;
use crate::canvas::CanvasSnapshot;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Characters left alone by a URI component encoder.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Upper bound on nested percent-encoding layers that are peeled off.
const MAX_OUTER_LAYERS: usize = 4;

/// Field carrying the stripped-images flag inside the payload.
const IMAGES_REMOVED_FIELD: &str = "imagesRemoved";

/// Every decode strategy failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Share payload could not be decoded by any strategy")]
pub struct DecodeError;

/// A snapshot with every image reference removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePayload {
    #[serde(flatten)]
    pub snapshot: CanvasSnapshot,
    /// True iff at least one card had an image before stripping.
    pub images_removed: bool,
}

impl SharePayload {
    /// Derive a share payload from a snapshot. The source is not touched.
    pub fn from_snapshot(source: &CanvasSnapshot) -> Self {
        let mut snapshot = source.clone();
        let mut images_removed = false;
        for item in snapshot.sections.values_mut().flatten() {
            images_removed |= item.has_image();
            item.image_url = None;
        }
        Self {
            snapshot,
            images_removed,
        }
    }
}

/// Result of a successful share decode.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedShare {
    /// The wire document, for merging present fields only.
    pub document: CanvasDocument,
    /// Whether the sender's canvas had images that were stripped.
    pub images_removed: bool,
    /// Strategy that produced the result.
    pub tier: DecodeTier,
}

impl DecodedShare {
    /// Resolve defaults into a complete snapshot.
    pub fn into_snapshot(self) -> CanvasSnapshot {
        self.document.into_snapshot()
    }
}

/// Decode strategies, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeTier {
    /// Undo the transport encoding, then the inner encoding.
    OuterThenInner,
    /// Undo the inner encoding, then the transport encoding.
    InnerThenOuter,
    /// The text carries only the inner encoding.
    InnerOnly,
}

impl DecodeTier {
    /// All tiers, in fallback order.
    pub const ORDER: [DecodeTier; 3] = [
        DecodeTier::OuterThenInner,
        DecodeTier::InnerThenOuter,
        DecodeTier::InnerOnly,
    ];

    /// Run this strategy, yielding the JSON text it recovers.
    pub fn apply(self, text: &str) -> Option<String> {
        match self {
            DecodeTier::OuterThenInner => decode_inner(&decode_outer(text)?),
            DecodeTier::InnerThenOuter => decode_outer(&decode_inner(text)?),
            DecodeTier::InnerOnly => decode_inner(text),
        }
    }
}

/// Undo percent-encoding until the text stops changing.
///
/// Handles payloads that an intermediary encoded twice.
fn decode_outer(text: &str) -> Option<String> {
    let mut current = text.trim().to_string();
    for _ in 0..MAX_OUTER_LAYERS {
        if !current.contains('%') {
            break;
        }
        let next = percent_decode_str(&current).decode_utf8().ok()?.into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    Some(current)
}

/// Undo the base64 layer, accepting either alphabet with or without padding.
///
/// Spaces are read as `+`, which form-style query decoding turns into spaces.
fn decode_inner(text: &str) -> Option<String> {
    let compact: String = text
        .trim()
        .chars()
        .map(|c| if c == ' ' { '+' } else { c })
        .filter(|c| !c.is_whitespace())
        .collect();
    if compact.is_empty() {
        return None;
    }
    let bytes = [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(compact.as_bytes()).ok())?;
    String::from_utf8(bytes).ok()
}

/// Encode a snapshot for a URL query parameter.
///
/// Returns the transport-safe payload and whether any images were removed.
pub fn encode_share(snapshot: &CanvasSnapshot) -> Result<(String, bool), serde_json::Error> {
    let payload = SharePayload::from_snapshot(snapshot);
    let json = serde_json::to_string(&payload)?;
    let inner = STANDARD.encode(json.as_bytes());
    let outer = utf8_percent_encode(&inner, URI_COMPONENT).to_string();
    log::debug!(
        "Encoded share payload: {} bytes json, {} bytes transport, images removed: {}",
        json.len(),
        outer.len(),
        payload.images_removed
    );
    Ok((outer, payload.images_removed))
}

/// Decode a share payload through the fallback chain.
pub fn decode_share(text: &str) -> Result<DecodedShare, DecodeError> {
    for tier in DecodeTier::ORDER {
        let Some(json) = tier.apply(text) else {
            log::debug!("Share decode tier {:?} could not unwrap the payload", tier);
            continue;
        };
        let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(&json) else {
            log::debug!("Share decode tier {:?} did not yield a JSON object", tier);
            continue;
        };

        let images_removed = object
            .remove(IMAGES_REMOVED_FIELD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        match CanvasDocument::from_value(Value::Object(object)) {
            Ok(document) => {
                log::debug!("Share payload decoded by tier {:?}", tier);
                return Ok(DecodedShare {
                    document,
                    images_removed,
                    tier,
                });
            }
            Err(e) => log::debug!("Share decode tier {:?} rejected document: {}", tier, e),
        }
    }
    Err(DecodeError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Item, SectionId};

    fn scenario_a() -> CanvasSnapshot {
        let mut snapshot = CanvasSnapshot::new();
        snapshot.title = "My Plan".to_string();
        snapshot.push_item(SectionId::KeyActivities, Item::new("1", "Build MVP", "#ffffff"));
        snapshot
    }

    fn scenario_b() -> CanvasSnapshot {
        let mut snapshot = CanvasSnapshot::new();
        snapshot.title = "My Plan".to_string();
        snapshot.push_item(
            SectionId::KeyActivities,
            Item::new("1", "Build MVP", "#ffffff").with_image("data:image/png;base64,AAAA"),
        );
        snapshot
    }

    #[test]
    fn test_share_round_trip_without_images() {
        let snapshot = scenario_a();
        let (payload, images_removed) = encode_share(&snapshot).unwrap();
        assert!(!images_removed);

        let decoded = decode_share(&payload).unwrap();
        assert_eq!(decoded.tier, DecodeTier::OuterThenInner);
        assert!(!decoded.images_removed);
        assert_eq!(decoded.into_snapshot(), snapshot);
    }

    #[test]
    fn test_share_strips_images() {
        let snapshot = scenario_b();
        let (payload, images_removed) = encode_share(&snapshot).unwrap();
        assert!(images_removed);
        // Source is left alone.
        assert!(snapshot.has_images());

        let decoded = decode_share(&payload).unwrap();
        assert!(decoded.images_removed);
        let restored = decoded.into_snapshot();
        let item = &restored.items(SectionId::KeyActivities)[0];
        assert_eq!(item.image_url, None);
        assert_eq!(item.title, "Build MVP");
        assert_eq!(item.color, "#ffffff");
        assert_eq!(item.id, "1");
    }

    #[test]
    fn test_empty_image_reference_is_not_stripped() {
        let mut snapshot = scenario_a();
        snapshot
            .items_mut(SectionId::KeyActivities)
            .push(Item::new("2", "Shops", "#ffffff").with_image(""));
        snapshot.items_mut(SectionId::KeyActivities)[0].image_url = Some(String::new());

        let (payload, images_removed) = encode_share(&snapshot).unwrap();
        assert!(!images_removed);
        let restored = decode_share(&payload).unwrap().into_snapshot();
        assert_eq!(restored.item_count(), 2);
        assert!(!restored.has_images());
    }

    #[test]
    fn test_payload_is_url_safe() {
        let mut snapshot = scenario_a();
        snapshot.title = "Plan ✓ & more? + / =".to_string();
        let (payload, _) = encode_share(&snapshot).unwrap();
        assert!(payload
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.!~*'()%".contains(c)));
    }

    #[test]
    fn test_double_encoded_payload_decodes() {
        let snapshot = scenario_a();
        let (payload, _) = encode_share(&snapshot).unwrap();
        let twice = utf8_percent_encode(&payload, URI_COMPONENT).to_string();

        let decoded = decode_share(&twice).unwrap();
        assert_eq!(decoded.into_snapshot(), snapshot);
    }

    #[test]
    fn test_form_decoded_payload_decodes() {
        // A `+` in the base64 text turned into a space by a form decoder.
        let mut snapshot = scenario_a();
        snapshot.title = "~~~>>>???".to_string();
        let json = serde_json::to_string(&SharePayload::from_snapshot(&snapshot)).unwrap();
        let inner = STANDARD.encode(json.as_bytes());
        let mangled = inner.replace('+', " ");

        let decoded = decode_share(&mangled).unwrap();
        assert_eq!(decoded.into_snapshot(), snapshot);
    }

    #[test]
    fn test_inner_then_outer_tier() {
        // Base64 of a percent-encoded document.
        let snapshot = scenario_a();
        let json = serde_json::to_string(&SharePayload::from_snapshot(&snapshot)).unwrap();
        let escaped = utf8_percent_encode(&json, URI_COMPONENT).to_string();
        let payload = STANDARD.encode(escaped.as_bytes());

        let decoded = decode_share(&payload).unwrap();
        assert_eq!(decoded.tier, DecodeTier::InnerThenOuter);
        assert_eq!(decoded.into_snapshot(), snapshot);
    }

    #[test]
    fn test_url_safe_alphabet_is_accepted() {
        let snapshot = scenario_a();
        let json = serde_json::to_string(&SharePayload::from_snapshot(&snapshot)).unwrap();
        let payload = URL_SAFE_NO_PAD.encode(json.as_bytes());

        assert_eq!(decode_share(&payload).unwrap().into_snapshot(), snapshot);
    }

    #[test]
    fn test_garbage_fails_without_panicking() {
        assert_eq!(decode_share(""), Err(DecodeError));
        assert_eq!(decode_share("%%%not-base64%%%"), Err(DecodeError));
        // Valid base64 that is not JSON.
        assert_eq!(decode_share(&STANDARD.encode(b"hello world")), Err(DecodeError));
        // Valid JSON that is not an object.
        assert_eq!(decode_share(&STANDARD.encode(b"[1,2,3]")), Err(DecodeError));
    }

    #[test]
    fn test_tiers_are_pure() {
        let (payload, _) = encode_share(&scenario_a()).unwrap();
        assert_eq!(
            DecodeTier::OuterThenInner.apply(&payload),
            DecodeTier::OuterThenInner.apply(&payload)
        );
        assert!(DecodeTier::InnerOnly.apply("%3D%3D").is_none());
    }
}
