//! State codec.
//!
//! Two dialects live here: the lossless file format written by
//! [`encode_full`] and read by [`decode_full`], and the image-stripped share
//! payload from [`share`] that is sized for embedding in a URL.
//!
//! Decoding always goes through the partial wire form [`CanvasDocument`],
//! whose fields are all optional. Defaults are resolved once, in
//! [`CanvasDocument::into_snapshot`], so a payload missing optional fields
//! decodes instead of failing and merges can tell absent fields apart.

mod share;

pub use share::{
    DecodeError, DecodeTier, DecodedShare, SharePayload, decode_share, encode_share,
};

use crate::canvas::{
    CanvasSnapshot, DEFAULT_CANVAS_COLOR, DEFAULT_ITEM_COLOR, DEFAULT_TEXT_COLOR, DEFAULT_TITLE,
    Item, ValidationError,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Failures of the full (file) decoder.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Syntax(String),
    #[error("Expected a JSON object at the top level")]
    NotAnObject,
    #[error("Missing the `data` field")]
    MissingData,
    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// A card as found on the wire, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: Option<Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub color: Option<String>,
    pub text_color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemRecord {
    /// Id of the card at `index` within `section`, generated when missing.
    fn resolved_id(&self, section: &str, index: usize) -> String {
        match &self.id {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("{section}-{index}"),
        }
    }

    /// Resolve defaults for a card at `index` within `section`.
    fn resolve(self, section: &str, index: usize, default_color: &str) -> Item {
        let id = self.resolved_id(section, index);
        Item {
            id,
            title: self.title.unwrap_or_default(),
            description: self.description,
            image_url: self.image_url.filter(|url| !url.is_empty()),
            color: self.color.unwrap_or_else(|| default_color.to_string()),
            text_color: self
                .text_color
                .unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
            extra: self.extra,
        }
    }
}

/// A canvas as found on the wire, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasDocument {
    #[serde(deserialize_with = "lenient_sections")]
    pub data: Option<BTreeMap<String, Vec<ItemRecord>>>,
    pub canvas_color: Option<String>,
    pub default_item_color: Option<String>,
    pub title: Option<String>,
    pub title_color: Option<String>,
    pub section_title_color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accept `data` as a map of arrays, skipping entries that are not cards.
fn lenient_sections<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, Vec<ItemRecord>>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<Map<String, Value>>::deserialize(deserializer)?;
    Ok(raw.map(|sections| {
        sections
            .into_iter()
            .map(|(key, value)| {
                let items = match value {
                    Value::Array(entries) => entries
                        .into_iter()
                        .filter_map(|entry| match serde_json::from_value::<ItemRecord>(entry) {
                            Ok(record) => Some(record),
                            Err(e) => {
                                log::warn!("Skipping malformed item in section {}: {}", key, e);
                                None
                            }
                        })
                        .collect(),
                    other => {
                        log::warn!("Section {} is not a list (found {}), ignoring", key, other);
                        Vec::new()
                    }
                };
                (key, items)
            })
            .collect()
    }))
}

impl CanvasDocument {
    /// Parse a wire document from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        if !value.is_object() {
            return Err(ParseError::NotAnObject);
        }
        serde_json::from_value(value).map_err(|e| ParseError::Malformed(e.to_string()))
    }

    /// Whether the primary `data` field was present.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Check that every card carries a title, as a persisted canvas must.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let Some(data) = &self.data else {
            return Ok(());
        };
        for (section, records) in data {
            for (index, record) in records.iter().enumerate() {
                if record.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
                    return Err(ValidationError::EmptyTitle {
                        section: section.clone(),
                        id: record.resolved_id(section, index),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve cards against a default item color.
    pub fn resolve_sections(
        data: BTreeMap<String, Vec<ItemRecord>>,
        default_item_color: &str,
    ) -> BTreeMap<String, Vec<Item>> {
        data.into_iter()
            .map(|(section, records)| {
                let items = records
                    .into_iter()
                    .enumerate()
                    .map(|(index, record)| record.resolve(&section, index, default_item_color))
                    .collect();
                (section, items)
            })
            .collect()
    }

    /// Apply defaults and produce a complete snapshot.
    pub fn into_snapshot(self) -> CanvasSnapshot {
        let default_item_color = self
            .default_item_color
            .unwrap_or_else(|| DEFAULT_ITEM_COLOR.to_string());
        let sections = self
            .data
            .map(|data| Self::resolve_sections(data, &default_item_color))
            .unwrap_or_default();

        CanvasSnapshot {
            sections,
            canvas_color: self
                .canvas_color
                .unwrap_or_else(|| DEFAULT_CANVAS_COLOR.to_string()),
            default_item_color,
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            title_color: self.title_color,
            section_title_color: self.section_title_color,
            extra: self.extra,
        }
    }
}

/// Serialize a snapshot to the lossless, pretty-printed file format.
///
/// Output is deterministic: section keys and unknown fields are emitted in
/// sorted order.
pub fn encode_full(snapshot: &CanvasSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(snapshot)
}

/// Parse text into a wire document without requiring `data`.
pub fn parse_document(text: &str) -> Result<CanvasDocument, ParseError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ParseError::Syntax(e.to_string()))?;
    CanvasDocument::from_value(value)
}

/// Decode the file format back into a snapshot.
pub fn decode_full(text: &str) -> Result<CanvasSnapshot, ParseError> {
    let document = parse_document(text)?;
    if !document.has_data() {
        return Err(ParseError::MissingData);
    }
    Ok(document.into_snapshot())
}
