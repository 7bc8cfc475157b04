//! Live canvas state.
//!
//! The store owns the one mutable snapshot of a session. It is passed by
//! reference to whoever needs it; there is no global instance.

use crate::canvas::{
    CanvasSnapshot, DEFAULT_TEXT_COLOR, Item, ItemIdGenerator, SectionId, ValidationError,
};
use crate::codec::CanvasDocument;

/// Fields supplied when creating or editing a card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemDraft {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Falls back to the canvas default item color.
    pub color: Option<String>,
    /// Falls back to black.
    pub text_color: Option<String>,
}

impl ItemDraft {
    /// Create a draft with just a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the image reference.
    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Set the card color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the text color.
    pub fn with_text_color(mut self, text_color: impl Into<String>) -> Self {
        self.text_color = Some(text_color.into());
        self
    }
}

/// Owner of the live snapshot.
#[derive(Debug, Default)]
pub struct CanvasStore {
    snapshot: CanvasSnapshot,
    ids: ItemIdGenerator,
}

impl CanvasStore {
    /// Create a store holding an empty canvas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from an existing snapshot.
    pub fn from_snapshot(snapshot: CanvasSnapshot) -> Self {
        Self {
            snapshot,
            ids: ItemIdGenerator::new(),
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> &CanvasSnapshot {
        &self.snapshot
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.snapshot.title = title.into();
    }

    pub fn set_canvas_color(&mut self, color: impl Into<String>) {
        self.snapshot.canvas_color = color.into();
    }

    pub fn set_default_item_color(&mut self, color: impl Into<String>) {
        self.snapshot.default_item_color = color.into();
    }

    pub fn set_title_color(&mut self, color: Option<String>) {
        self.snapshot.title_color = color;
    }

    pub fn set_section_title_color(&mut self, color: Option<String>) {
        self.snapshot.section_title_color = color;
    }

    /// Merge the fields present in a decoded document.
    ///
    /// Sections are replaced as a whole when `data` is present. Absent or
    /// empty fields leave the current values alone. Cards without a color
    /// take the default item color in effect after the merge.
    pub fn merge(&mut self, document: CanvasDocument) {
        let present = |value: Option<String>| value.filter(|v| !v.is_empty());
        if let Some(color) = present(document.canvas_color) {
            self.snapshot.canvas_color = color;
        }
        if let Some(color) = present(document.default_item_color) {
            self.snapshot.default_item_color = color;
        }
        if let Some(title) = present(document.title) {
            self.snapshot.title = title;
        }
        if let Some(color) = present(document.title_color) {
            self.snapshot.title_color = Some(color);
        }
        if let Some(color) = present(document.section_title_color) {
            self.snapshot.section_title_color = Some(color);
        }
        if let Some(data) = document.data {
            self.snapshot.sections =
                CanvasDocument::resolve_sections(data, &self.snapshot.default_item_color);
        }
        self.snapshot.extra.extend(document.extra);
        log::debug!(
            "Merged document: {} items across {} sections",
            self.snapshot.item_count(),
            self.snapshot.sections.len()
        );
    }

    /// Append a new card to a section and return its id.
    pub fn add_item(&mut self, section: SectionId, draft: ItemDraft) -> Result<String, ValidationError> {
        let id = self.ids.next_id();
        if draft.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle {
                section: section.to_string(),
                id,
            });
        }

        let color = draft
            .color
            .unwrap_or_else(|| self.snapshot.default_item_color.clone());
        let mut item = Item::new(id.clone(), draft.title, color).with_text_color(
            draft
                .text_color
                .unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
        );
        item.description = draft.description.filter(|d| !d.is_empty());
        item.image_url = draft.image_url.filter(|url| !url.is_empty());

        self.snapshot.push_item(section, item);
        Ok(id)
    }

    /// Replace the editable fields of an existing card.
    ///
    /// Unset colors in the draft keep the card's current colors.
    pub fn update_item(
        &mut self,
        section: SectionId,
        id: &str,
        draft: ItemDraft,
    ) -> Result<(), ValidationError> {
        if draft.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle {
                section: section.to_string(),
                id: id.to_string(),
            });
        }
        let item = self
            .snapshot
            .section_mut(section)
            .and_then(|items| items.iter_mut().find(|item| item.id == id))
            .ok_or_else(|| ValidationError::ItemNotFound {
                section: section.to_string(),
                id: id.to_string(),
            })?;

        item.title = draft.title;
        item.description = draft.description.filter(|d| !d.is_empty());
        item.image_url = draft.image_url.filter(|url| !url.is_empty());
        if let Some(color) = draft.color {
            item.color = color;
        }
        if let Some(text_color) = draft.text_color {
            item.text_color = text_color;
        }
        Ok(())
    }

    /// Remove a card. Returns the removed card.
    pub fn remove_item(&mut self, section: SectionId, id: &str) -> Result<Item, ValidationError> {
        let not_found = || ValidationError::ItemNotFound {
            section: section.to_string(),
            id: id.to_string(),
        };
        let items = self.snapshot.section_mut(section).ok_or_else(not_found)?;
        let index = items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(not_found)?;
        Ok(items.remove(index))
    }

    /// Move the card at `from` so it ends up at `to`.
    pub fn move_item(&mut self, section: SectionId, from: usize, to: usize) -> Result<(), ValidationError> {
        let invalid = || ValidationError::InvalidOrder {
            section: section.to_string(),
        };
        let items = self.snapshot.section_mut(section).ok_or_else(invalid)?;
        if from >= items.len() || to >= items.len() {
            return Err(invalid());
        }
        if from != to {
            let item = items.remove(from);
            items.insert(to, item);
        }
        Ok(())
    }

    /// Reorder a section to match `order`, a permutation of its card ids.
    ///
    /// The section is left untouched when `order` is not a permutation.
    pub fn reorder_items(&mut self, section: SectionId, order: &[String]) -> Result<(), ValidationError> {
        let Some(items) = self.snapshot.section_mut(section) else {
            return if order.is_empty() {
                Ok(())
            } else {
                Err(ValidationError::InvalidOrder {
                    section: section.to_string(),
                })
            };
        };
        let mut positions = Vec::with_capacity(order.len());
        for id in order {
            match items.iter().position(|item| &item.id == id) {
                Some(index) if !positions.contains(&index) => positions.push(index),
                _ => {
                    return Err(ValidationError::InvalidOrder {
                        section: section.to_string(),
                    });
                }
            }
        }
        if positions.len() != items.len() {
            return Err(ValidationError::InvalidOrder {
                section: section.to_string(),
            });
        }

        let reordered = positions.iter().map(|&index| items[index].clone()).collect();
        *items = reordered;
        Ok(())
    }

    /// Reset to an empty canvas with the default title and colors.
    pub fn clear(&mut self) {
        self.snapshot = CanvasSnapshot::new();
        log::info!("Canvas cleared");
    }
}
