//! Canvas snapshot and card model.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Background color of a fresh canvas.
pub const DEFAULT_CANVAS_COLOR: &str = "#f5f3ed";
/// Background color given to new cards.
pub const DEFAULT_ITEM_COLOR: &str = "#9dc8ac";
/// Color of the canvas title when none is chosen.
pub const DEFAULT_TITLE_COLOR: &str = "#1f2937";
/// Color of section headers when none is chosen.
pub const DEFAULT_SECTION_TITLE_COLOR: &str = "#374151";
/// Card text color when none is chosen.
pub const DEFAULT_TEXT_COLOR: &str = "#000000";
/// Placeholder title of a fresh canvas.
pub const DEFAULT_TITLE: &str = "Click to edit title";

/// One of the nine fixed canvas sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionId {
    KeyPartnerships,
    KeyActivities,
    ValueProposition,
    CustomerRelationships,
    Customers,
    KeyResources,
    BudgetCost,
    DistributionChannels,
    RevenueStreams,
}

impl SectionId {
    /// All sections, in declaration order.
    pub const ALL: [SectionId; 9] = [
        SectionId::KeyPartnerships,
        SectionId::KeyActivities,
        SectionId::ValueProposition,
        SectionId::CustomerRelationships,
        SectionId::Customers,
        SectionId::KeyResources,
        SectionId::BudgetCost,
        SectionId::DistributionChannels,
        SectionId::RevenueStreams,
    ];

    /// Key used for this section in the `data` map.
    pub fn as_str(self) -> &'static str {
        match self {
            SectionId::KeyPartnerships => "keyPartnerships",
            SectionId::KeyActivities => "keyActivities",
            SectionId::ValueProposition => "valueProposition",
            SectionId::CustomerRelationships => "customerRelationships",
            SectionId::Customers => "customers",
            SectionId::KeyResources => "keyResources",
            SectionId::BudgetCost => "budgetCost",
            SectionId::DistributionChannels => "distributionChannels",
            SectionId::RevenueStreams => "revenueStreams",
        }
    }

    /// Look up a section by its `data` key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == key)
    }

    /// Numbered English header shown above the section.
    pub fn label(self) -> &'static str {
        match self {
            SectionId::KeyPartnerships => "5. Key Partnerships",
            SectionId::KeyActivities => "6. Key Activities",
            SectionId::ValueProposition => "1. Value Proposition",
            SectionId::CustomerRelationships => "3. Customer Relationships",
            SectionId::Customers => "2. Customers",
            SectionId::KeyResources => "7. Key Resources",
            SectionId::BudgetCost => "8. Budget Cost",
            SectionId::DistributionChannels => "4. Distribution Channels",
            SectionId::RevenueStreams => "9. Revenue Streams",
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for data that is about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Item {id} in section {section} has an empty title")]
    EmptyTitle { section: String, id: String },
    #[error("Item {id} not found in section {section}")]
    ItemNotFound { section: String, id: String },
    #[error("Reorder of section {section} is not a permutation of its items")]
    InvalidOrder { section: String },
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

/// A single card on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Identifier, unique within its section.
    pub id: String,
    /// Card title. Must be non-empty to be persisted.
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Remote URL, local path or embedded `data:` URL. Empty means none.
    #[serde(skip_serializing_if = "is_blank")]
    pub image_url: Option<String>,
    /// Card background color.
    pub color: String,
    /// Card text color.
    pub text_color: String,
    /// Fields this version does not understand, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Create a card with the given id, title and background color.
    pub fn new(id: impl Into<String>, title: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            image_url: None,
            color: color.into(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            extra: Map::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the image reference. An empty reference clears it.
    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into()).filter(|url| !url.is_empty());
        self
    }

    /// Whether the card references an image.
    pub fn has_image(&self) -> bool {
        !is_blank(&self.image_url)
    }

    /// Set the text color.
    pub fn with_text_color(mut self, text_color: impl Into<String>) -> Self {
        self.text_color = text_color.into();
        self
    }
}

/// The complete state of one canvas.
///
/// Serializes to the file format: `data`, `canvasColor`, `defaultItemColor`,
/// `title`, then the optional colors and any preserved unknown fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSnapshot {
    /// Section key to ordered cards. Unknown keys are kept but never rendered.
    #[serde(rename = "data")]
    pub sections: BTreeMap<String, Vec<Item>>,
    pub canvas_color: String,
    pub default_item_color: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title_color: Option<String>,
    /// Fields this version does not understand, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for CanvasSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasSnapshot {
    /// Create an empty canvas with the default title and colors.
    pub fn new() -> Self {
        Self {
            sections: BTreeMap::new(),
            canvas_color: DEFAULT_CANVAS_COLOR.to_string(),
            default_item_color: DEFAULT_ITEM_COLOR.to_string(),
            title: DEFAULT_TITLE.to_string(),
            title_color: None,
            section_title_color: None,
            extra: Map::new(),
        }
    }

    /// Cards of a known section, empty if the section has none.
    pub fn items(&self, section: SectionId) -> &[Item] {
        self.sections
            .get(section.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Mutable card list of a section, created on demand.
    pub fn items_mut(&mut self, section: SectionId) -> &mut Vec<Item> {
        self.sections.entry(section.as_str().to_string()).or_default()
    }

    /// Mutable card list of a section, if it exists.
    pub fn section_mut(&mut self, section: SectionId) -> Option<&mut Vec<Item>> {
        self.sections.get_mut(section.as_str())
    }

    /// Append a card to a section.
    pub fn push_item(&mut self, section: SectionId, item: Item) {
        self.items_mut(section).push(item);
    }

    /// Total number of cards across all sections, including unknown ones.
    pub fn item_count(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    /// Whether any card references an image.
    pub fn has_images(&self) -> bool {
        self.sections
            .values()
            .flatten()
            .any(Item::has_image)
    }

    /// Title color, falling back to the default.
    pub fn title_color_or_default(&self) -> &str {
        self.title_color.as_deref().unwrap_or(DEFAULT_TITLE_COLOR)
    }

    /// Section header color, falling back to the default.
    pub fn section_title_color_or_default(&self) -> &str {
        self.section_title_color
            .as_deref()
            .unwrap_or(DEFAULT_SECTION_TITLE_COLOR)
    }

    /// Check that every card can be persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (section, items) in &self.sections {
            if let Some(item) = items.iter().find(|item| item.title.trim().is_empty()) {
                return Err(ValidationError::EmptyTitle {
                    section: section.clone(),
                    id: item.id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Monotonic card id source.
///
/// Ids are seeded from the wall clock in milliseconds and never repeat
/// within one generator, even when several are requested in the same
/// millisecond. They are not unique across sessions.
#[derive(Debug, Default)]
pub struct ItemIdGenerator {
    last: AtomicU64,
}

impl ItemIdGenerator {
    /// Create a new generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next id.
    pub fn next_id(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1).to_string()
    }
}
