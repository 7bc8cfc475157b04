//! Application state and action dispatch.

use crate::notify::Notification;
use bmcmaker_core::files::{self, FileError, ImportOutcome};
use bmcmaker_core::share::ShareError;
use bmcmaker_core::{
    CanvasStore, Clipboard, ItemDraft, SectionId, ShareLinkService, ValidationError,
    load_from_url,
};
use bmcmaker_render::{ExportConfig, ExportError, ExportFormat, Exporter, Stage};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Share(#[from] ShareError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Origin share links point at.
    pub origin: String,
    /// Path share links point at.
    pub path: String,
    /// Where the working canvas is kept between runs.
    pub state_path: PathBuf,
    /// Directory exports are written to.
    pub out_dir: PathBuf,
    /// Width the canvas is presented at.
    pub viewport_width: f64,
    pub export: ExportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let state_path = dirs::data_dir()
            .map(|dir| dir.join("bmcmaker").join("canvas.json"))
            .unwrap_or_else(|| PathBuf::from(".bmcmaker-canvas.json"));
        Self {
            origin: "http://localhost:8080".to_string(),
            path: "/".to_string(),
            state_path,
            out_dir: PathBuf::from("."),
            viewport_width: 1280.0,
            export: ExportConfig::default(),
        }
    }
}

/// Canvas colors to change. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorChange {
    pub canvas: Option<String>,
    /// Default background of new cards.
    pub item: Option<String>,
    /// An empty value restores the default title color.
    pub title: Option<String>,
    /// An empty value restores the default section title color.
    pub section_title: Option<String>,
}

/// Card fields to change.
///
/// Unset fields keep their current values. An empty description or image
/// removes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub color: Option<String>,
    pub text_color: Option<String>,
}

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Reset to a blank canvas, optionally titled.
    NewCanvas { title: Option<String> },
    SetTitle(String),
    SetColors(ColorChange),
    AddItem { section: SectionId, draft: ItemDraft },
    EditItem {
        section: SectionId,
        id: String,
        edit: ItemEdit,
    },
    RemoveItem { section: SectionId, id: String },
    MoveItem { section: SectionId, from: usize, to: usize },
    /// Put a section's cards in the given id order.
    ReorderItems { section: SectionId, order: Vec<String> },
    /// Build a share link and copy it.
    Share,
    /// Load a shared canvas from a link.
    OpenLink(String),
    Import(PathBuf),
    ExportJson(Option<PathBuf>),
    ExportArtifact {
        format: ExportFormat,
        output: Option<PathBuf>,
    },
}

impl Action {
    /// Whether the action changes the canvas.
    fn mutates(&self) -> bool {
        !matches!(
            self,
            Action::Share | Action::ExportJson(_) | Action::ExportArtifact { .. }
        )
    }
}

/// Main application struct.
pub struct App<C: Clipboard> {
    config: AppConfig,
    store: CanvasStore,
    share: ShareLinkService<C>,
    exporter: Exporter,
    /// Raised while opening, reported with the first dispatch.
    pending: Vec<Notification>,
}

impl<C: Clipboard> App<C> {
    /// Open the working canvas, starting empty when there is none yet.
    ///
    /// An unreadable canvas is moved aside to `<state>.bak` and the app
    /// starts empty.
    pub fn open(config: AppConfig, clipboard: C) -> Self {
        let mut pending = Vec::new();
        let store = load_state(&config.state_path, &mut pending);
        let exporter = Exporter::new(config.export.clone());
        Self {
            config,
            store,
            share: ShareLinkService::new(clipboard),
            exporter,
            pending,
        }
    }

    /// Replace the exporter, e.g. to change its image loader.
    pub fn with_exporter(mut self, exporter: Exporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &CanvasStore {
        &self.store
    }

    /// Perform `action`, persisting the canvas if it changed.
    pub async fn dispatch(&mut self, action: Action) -> AppResult<Vec<Notification>> {
        log::debug!("Dispatching {:?}", action);
        let mutates = action.mutates();
        let mut notes = std::mem::take(&mut self.pending);
        notes.extend(self.handle(action).await?);
        if mutates {
            self.save()?;
        }
        Ok(notes)
    }

    async fn handle(&mut self, action: Action) -> AppResult<Vec<Notification>> {
        match action {
            Action::NewCanvas { title } => {
                self.store.clear();
                if let Some(title) = title {
                    self.store.set_title(title);
                }
                Ok(vec![Notification::canvas_cleared()])
            }
            Action::SetTitle(title) => {
                self.store.set_title(title);
                Ok(Vec::new())
            }
            Action::SetColors(change) => {
                self.set_colors(change);
                Ok(Vec::new())
            }
            Action::AddItem { section, draft } => {
                let id = self.store.add_item(section, draft)?;
                Ok(vec![Notification::info(format!("Added item {id} to {section}"))])
            }
            Action::EditItem { section, id, edit } => {
                let draft = self.edited_draft(section, &id, edit)?;
                self.store.update_item(section, &id, draft)?;
                Ok(vec![Notification::info(format!("Updated item {id} in {section}"))])
            }
            Action::RemoveItem { section, id } => {
                let removed = self.store.remove_item(section, &id)?;
                Ok(vec![Notification::info(format!("Removed \"{}\"", removed.title))])
            }
            Action::MoveItem { section, from, to } => {
                self.store.move_item(section, from, to)?;
                Ok(Vec::new())
            }
            Action::ReorderItems { section, order } => {
                self.store.reorder_items(section, &order)?;
                Ok(Vec::new())
            }
            Action::Share => self.share_link().await,
            Action::OpenLink(url) => Ok(load_from_url(&mut self.store, &url)
                .map(|outcome| Notification::shared_canvas_loaded(outcome.images_removed))
                .into_iter()
                .collect()),
            Action::Import(path) => Ok(vec![self.import(&path)]),
            Action::ExportJson(output) => {
                let path = output.unwrap_or_else(|| files::default_path(&self.config.out_dir));
                files::export_to_path(self.store.snapshot(), &path)?;
                Ok(vec![
                    Notification::exported_json(),
                    Notification::info(path.display().to_string()),
                ])
            }
            Action::ExportArtifact { format, output } => {
                let path = output.unwrap_or_else(|| self.config.out_dir.join(format.file_name()));
                self.export_artifact(format, &path).await
            }
        }
    }

    fn set_colors(&mut self, change: ColorChange) {
        let reset_empty = |color: String| Some(color).filter(|c| !c.is_empty());
        if let Some(color) = change.canvas {
            self.store.set_canvas_color(color);
        }
        if let Some(color) = change.item {
            self.store.set_default_item_color(color);
        }
        if let Some(color) = change.title {
            self.store.set_title_color(reset_empty(color));
        }
        if let Some(color) = change.section_title {
            self.store.set_section_title_color(reset_empty(color));
        }
    }

    /// The card's current fields with `edit` applied.
    fn edited_draft(&self, section: SectionId, id: &str, edit: ItemEdit) -> AppResult<ItemDraft> {
        let item = self
            .store
            .snapshot()
            .items(section)
            .iter()
            .find(|item| item.id == id)
            .ok_or_else(|| ValidationError::ItemNotFound {
                section: section.to_string(),
                id: id.to_string(),
            })?;
        Ok(ItemDraft {
            title: edit.title.unwrap_or_else(|| item.title.clone()),
            description: edit.description.or_else(|| item.description.clone()),
            image_url: edit.image.or_else(|| item.image_url.clone()),
            color: edit.color,
            text_color: edit.text_color,
        })
    }

    async fn share_link(&self) -> AppResult<Vec<Notification>> {
        let link = match self
            .share
            .build_share_url(self.store.snapshot(), &self.config.origin, &self.config.path)
            .await
        {
            Ok(link) => link,
            Err(e) => {
                log::error!("Failed to create share link: {}", e);
                return Ok(vec![Notification::share_failed()]);
            }
        };

        let mut notes = Vec::new();
        match &link.clipboard_error {
            None => notes.push(Notification::share_link_copied(link.images_removed)),
            Some(e) => notes.push(Notification::warning(format!(
                "Could not copy the link to the clipboard: {e}"
            ))),
        }
        notes.push(Notification::info(link.url));
        Ok(notes)
    }

    fn import(&mut self, path: &Path) -> Notification {
        match files::import_from_path(&mut self.store, path) {
            Ok(ImportOutcome::Imported) => Notification::canvas_imported(),
            Ok(ImportOutcome::Ignored) => {
                Notification::warning("The file has no canvas data; nothing was imported")
            }
            Err(e) => {
                log::warn!("Import of {} failed: {}", path.display(), e);
                Notification::warning(format!("Failed to import canvas: {e}"))
            }
        }
    }

    async fn export_artifact(
        &self,
        format: ExportFormat,
        path: &Path,
    ) -> AppResult<Vec<Notification>> {
        let mut notes = vec![Notification::generating(format)];
        let mut stage = Stage::from_snapshot(self.store.snapshot(), self.config.viewport_width);
        let bytes = self.exporter.export_artifact(&mut stage, format).await?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        fs::write(path, &bytes).map_err(|e| AppError::Io(format!("{}: {}", path.display(), e)))?;
        log::info!("Wrote {} ({} bytes)", path.display(), bytes.len());

        notes.push(Notification::exported(format));
        notes.push(Notification::info(path.display().to_string()));
        Ok(notes)
    }

    fn save(&self) -> AppResult<()> {
        files::export_to_path(self.store.snapshot(), &self.config.state_path)?;
        Ok(())
    }
}

/// Read the working canvas at `path`.
///
/// A file that fails to load is renamed to `<path>.bak` so the next save
/// does not overwrite it.
fn load_state(path: &Path, notes: &mut Vec<Notification>) -> CanvasStore {
    if !path.exists() {
        log::debug!("No canvas at {}, starting empty", path.display());
        return CanvasStore::new();
    }
    let mut store = CanvasStore::new();
    let Err(e) = files::import_from_path(&mut store, path) else {
        return store;
    };

    log::warn!("Canvas at {} is unreadable: {}", path.display(), e);
    let mut backup = path.as_os_str().to_owned();
    backup.push(".bak");
    let backup = PathBuf::from(backup);
    match fs::rename(path, &backup) {
        Ok(()) => notes.push(Notification::warning(format!(
            "The saved canvas could not be read and was moved to {}; starting empty",
            backup.display()
        ))),
        Err(rename_err) => {
            log::error!("Failed to move {} aside: {}", path.display(), rename_err);
            notes.push(Notification::warning(format!(
                "The saved canvas could not be read ({e}); starting empty"
            )));
        }
    }
    CanvasStore::new()
}
