//! Full-fidelity canvas files.

use crate::canvas::{CanvasSnapshot, ValidationError};
use crate::codec::{ParseError, encode_full, parse_document};
use crate::store::CanvasStore;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default name of an exported canvas file.
pub const DEFAULT_FILE_NAME: &str = "bmc-canvas.json";

/// File import/export errors.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Result type for file operations.
pub type FileResult<T> = Result<T, FileError>;

/// What an import did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The document carried `data` and was merged.
    Imported,
    /// The document had no `data`; the store is unchanged.
    Ignored,
}

/// Path of the default export file inside `dir`.
pub fn default_path(dir: &Path) -> PathBuf {
    dir.join(DEFAULT_FILE_NAME)
}

/// Write a snapshot to `path` in the file format.
pub fn export_to_path(snapshot: &CanvasSnapshot, path: &Path) -> FileResult<()> {
    snapshot.validate()?;
    let json = encode_full(snapshot).map_err(|e| FileError::Serialization(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            FileError::Io(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    fs::write(path, json)
        .map_err(|e| FileError::Io(format!("Failed to write {}: {}", path.display(), e)))?;
    log::info!("Exported canvas to {}", path.display());
    Ok(())
}

/// Merge a canvas file's text into the store.
///
/// A document without `data` is ignored, matching an import of an
/// unrelated JSON file. A document with untitled cards is rejected and the
/// store is left untouched.
pub fn import_text(store: &mut CanvasStore, text: &str) -> FileResult<ImportOutcome> {
    let document = parse_document(text)?;
    if !document.has_data() {
        log::warn!("Imported document has no data field, ignoring");
        return Ok(ImportOutcome::Ignored);
    }
    document.validate()?;
    store.merge(document);
    Ok(ImportOutcome::Imported)
}

/// Read a canvas file from `path` and merge it into the store.
pub fn import_from_path(store: &mut CanvasStore, path: &Path) -> FileResult<ImportOutcome> {
    let text = fs::read_to_string(path)
        .map_err(|e| FileError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    let outcome = import_text(store, &text)?;
    log::info!("Imported {} ({:?})", path.display(), outcome);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Item, SectionId};
    use tempfile::TempDir;

    fn sample() -> CanvasSnapshot {
        let mut snapshot = CanvasSnapshot::new();
        snapshot.title = "My Plan".to_string();
        snapshot.push_item(
            SectionId::KeyActivities,
            Item::new("1", "Build MVP", "#ffffff").with_image("data:image/png;base64,AAAA"),
        );
        snapshot
    }

    #[test]
    fn test_export_then_import() {
        let dir = TempDir::new().unwrap();
        let path = default_path(dir.path());
        export_to_path(&sample(), &path).unwrap();

        let mut store = CanvasStore::new();
        let outcome = import_from_path(&mut store, &path).unwrap();
        assert_eq!(outcome, ImportOutcome::Imported);
        assert_eq!(store.snapshot(), &sample());
    }

    #[test]
    fn test_export_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("plan.json");
        export_to_path(&sample(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_export_rejects_empty_titles() {
        let dir = TempDir::new().unwrap();
        let mut snapshot = sample();
        snapshot.push_item(SectionId::Customers, Item::new("2", "", "#ffffff"));

        let result = export_to_path(&snapshot, &default_path(dir.path()));
        assert!(matches!(result, Err(FileError::Invalid(_))));
    }

    #[test]
    fn test_import_without_data_is_ignored() {
        let mut store = CanvasStore::new();
        store.set_title("Untouched");

        let outcome = import_text(&mut store, r##"{"title": "Other", "canvasColor": "#000"}"##).unwrap();
        assert_eq!(outcome, ImportOutcome::Ignored);
        assert_eq!(store.snapshot().title, "Untouched");
    }

    #[test]
    fn test_import_merges_present_fields() {
        let mut store = CanvasStore::new();
        store.set_canvas_color("#000000");

        import_text(&mut store, r##"{"data": {}, "title": "Imported"}"##).unwrap();
        assert_eq!(store.snapshot().title, "Imported");
        assert_eq!(store.snapshot().canvas_color, "#000000");
    }

    #[test]
    fn test_import_rejects_untitled_cards() {
        let mut store = CanvasStore::new();
        store.set_title("Untouched");

        let result = import_text(
            &mut store,
            r##"{"data": {"customers": [{"id": "1", "title": ""}]}, "title": "X"}"##,
        );
        assert!(matches!(
            result,
            Err(FileError::Invalid(ValidationError::EmptyTitle { .. }))
        ));
        assert_eq!(store.snapshot().title, "Untouched");
        assert_eq!(store.snapshot().item_count(), 0);
    }

    #[test]
    fn test_import_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = CanvasStore::new();
        let result = import_from_path(&mut store, &path);
        assert!(matches!(result, Err(FileError::Parse(ParseError::Syntax(_)))));

        let missing = import_from_path(&mut store, &dir.path().join("missing.json"));
        assert!(matches!(missing, Err(FileError::Io(_))));
    }
}
