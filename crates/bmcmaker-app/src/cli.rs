//! Command-line arguments.

use crate::app::{Action, AppConfig, ColorChange, ItemEdit};
use bmcmaker_core::{ItemDraft, SectionId};
use bmcmaker_render::{ExportFormat, FontSource};
use bmcmaker_render::color::parse_color;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "bmcmaker",
    version,
    about = "Business model canvas maker: edit, share and export canvases"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Raise log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Canvas state file (default: the platform data directory).
    #[arg(long, value_name = "PATH", global = true)]
    pub state: Option<PathBuf>,

    /// Directory exported files are written to.
    #[arg(long = "out-dir", value_name = "DIR", global = true)]
    pub out_dir: Option<PathBuf>,

    /// Font file used for exported text, backed by the bundled font.
    #[arg(long, value_name = "PATH", global = true)]
    pub font: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a fresh canvas, discarding the current one.
    New {
        /// Title of the new canvas.
        #[arg(long)]
        title: Option<String>,
    },

    /// Change the canvas title.
    Title { title: String },

    /// Change canvas colors.
    Color {
        /// Canvas background.
        #[arg(long, value_parser = parse_hex)]
        canvas: Option<String>,
        /// Default background of new cards.
        #[arg(long, value_parser = parse_hex)]
        item: Option<String>,
        /// Title color; an empty value restores the default.
        #[arg(long, value_parser = parse_hex_or_empty)]
        title: Option<String>,
        /// Section title color; an empty value restores the default.
        #[arg(long = "section-title", value_parser = parse_hex_or_empty)]
        section_title: Option<String>,
    },

    /// Add a card to a section.
    Add {
        /// Section key, e.g. keyPartnerships or valueProposition.
        #[arg(value_parser = parse_section)]
        section: SectionId,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Image reference: data URL, file path or http(s) URL.
        #[arg(long)]
        image: Option<String>,
        /// Card background color (#rrggbb).
        #[arg(long, value_parser = parse_hex)]
        color: Option<String>,
    },

    /// Change a card. Options left out keep their current values.
    Edit {
        #[arg(value_parser = parse_section)]
        section: SectionId,
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// New description; an empty value removes it.
        #[arg(long)]
        description: Option<String>,
        /// New image reference; an empty value removes it.
        #[arg(long)]
        image: Option<String>,
        #[arg(long, value_parser = parse_hex)]
        color: Option<String>,
        #[arg(long = "text-color", value_parser = parse_hex)]
        text_color: Option<String>,
    },

    /// Remove a card from a section.
    Remove {
        #[arg(value_parser = parse_section)]
        section: SectionId,
        id: String,
    },

    /// Move a card within a section.
    Move {
        #[arg(value_parser = parse_section)]
        section: SectionId,
        from: usize,
        to: usize,
    },

    /// Put a section's cards in the given order.
    Reorder {
        #[arg(value_parser = parse_section)]
        section: SectionId,
        /// Every card id of the section, in the new order.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Build a share link and copy it to the clipboard.
    Share {
        /// Origin the link points at.
        #[arg(long)]
        origin: Option<String>,
        /// Path the link points at.
        #[arg(long)]
        path: Option<String>,
    },

    /// Load a shared canvas from a link.
    Open { url: String },

    /// Import a canvas file.
    Import { file: PathBuf },

    /// Export the canvas as PDF, PNG or JSON.
    Export {
        #[arg(long, value_enum, default_value = "pdf")]
        format: FormatArg,

        /// Viewport width the canvas is presented at.
        #[arg(long, value_name = "PX")]
        viewport: Option<f64>,

        /// Output file (default: bmc-canvas.<ext> in the output directory).
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Pdf,
    Png,
    Json,
}

fn parse_section(key: &str) -> Result<SectionId, String> {
    SectionId::from_key(key).ok_or_else(|| {
        let keys: Vec<&str> = SectionId::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown section '{}', expected one of: {}", key, keys.join(", "))
    })
}

fn parse_hex(value: &str) -> Result<String, String> {
    match parse_color(value) {
        Some(_) => Ok(value.trim().to_string()),
        None => Err(format!(
            "invalid color '{value}', expected #rgb, #rrggbb or #rrggbbaa"
        )),
    }
}

fn parse_hex_or_empty(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Ok(String::new())
    } else {
        parse_hex(value)
    }
}

impl Cli {
    /// Default log filter for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Apply path overrides to `config`.
    pub fn configure(&self, mut config: AppConfig) -> AppConfig {
        if let Some(state) = &self.state {
            config.state_path = state.clone();
        }
        if let Some(dir) = &self.out_dir {
            config.out_dir = dir.clone();
        }
        if let Some(font) = &self.font {
            config.export = config
                .export
                .with_font_source(FontSource::Path(font.clone()));
        }
        if let Command::Share { origin, path } = &self.command {
            if let Some(origin) = origin {
                config.origin = origin.clone();
            }
            if let Some(path) = path {
                config.path = path.clone();
            }
        }
        if let Command::Export {
            viewport: Some(width),
            ..
        } = &self.command
        {
            config.viewport_width = *width;
        }
        config
    }

    /// The action this invocation performs.
    pub fn action(&self) -> Action {
        match &self.command {
            Command::New { title } => Action::NewCanvas {
                title: title.clone(),
            },
            Command::Title { title } => Action::SetTitle(title.clone()),
            Command::Color {
                canvas,
                item,
                title,
                section_title,
            } => Action::SetColors(ColorChange {
                canvas: canvas.clone(),
                item: item.clone(),
                title: title.clone(),
                section_title: section_title.clone(),
            }),
            Command::Add {
                section,
                title,
                description,
                image,
                color,
            } => {
                let mut draft = ItemDraft::new(title.clone());
                if let Some(description) = description {
                    draft = draft.with_description(description.clone());
                }
                if let Some(image) = image {
                    draft = draft.with_image(image.clone());
                }
                if let Some(color) = color {
                    draft = draft.with_color(color.clone());
                }
                Action::AddItem {
                    section: *section,
                    draft,
                }
            }
            Command::Edit {
                section,
                id,
                title,
                description,
                image,
                color,
                text_color,
            } => Action::EditItem {
                section: *section,
                id: id.clone(),
                edit: ItemEdit {
                    title: title.clone(),
                    description: description.clone(),
                    image: image.clone(),
                    color: color.clone(),
                    text_color: text_color.clone(),
                },
            },
            Command::Remove { section, id } => Action::RemoveItem {
                section: *section,
                id: id.clone(),
            },
            Command::Move { section, from, to } => Action::MoveItem {
                section: *section,
                from: *from,
                to: *to,
            },
            Command::Reorder { section, ids } => Action::ReorderItems {
                section: *section,
                order: ids.clone(),
            },
            Command::Share { .. } => Action::Share,
            Command::Open { url } => Action::OpenLink(url.clone()),
            Command::Import { file } => Action::Import(file.clone()),
            Command::Export { format, output, .. } => match format {
                FormatArg::Json => Action::ExportJson(output.clone()),
                FormatArg::Pdf => Action::ExportArtifact {
                    format: ExportFormat::Pdf,
                    output: output.clone(),
                },
                FormatArg::Png => Action::ExportArtifact {
                    format: ExportFormat::Png,
                    output: output.clone(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let cli = Cli::parse_from([
            "bmcmaker",
            "add",
            "keyActivities",
            "Build MVP",
            "--description",
            "First version",
            "-v",
        ]);
        assert_eq!(cli.log_level(), "debug");
        match cli.action() {
            Action::AddItem { section, draft } => {
                assert_eq!(section, SectionId::KeyActivities);
                assert_eq!(draft.title, "Build MVP");
                assert_eq!(draft.description.as_deref(), Some("First version"));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let err = Cli::try_parse_from(["bmcmaker", "add", "nowhere", "x"]).unwrap_err();
        assert!(err.to_string().contains("unknown section"));
    }

    #[test]
    fn test_export_overrides() {
        let cli = Cli::parse_from([
            "bmcmaker",
            "export",
            "--format",
            "png",
            "--viewport",
            "375",
            "--out-dir",
            "/tmp/out",
            "--font",
            "/tmp/Inter.ttf",
        ]);
        let config = cli.configure(AppConfig::default());
        assert_eq!(config.viewport_width, 375.0);
        assert_eq!(
            config.export.font_source,
            FontSource::Path(PathBuf::from("/tmp/Inter.ttf"))
        );
        assert_eq!(config.out_dir, PathBuf::from("/tmp/out"));
        assert!(matches!(
            cli.action(),
            Action::ExportArtifact {
                format: ExportFormat::Png,
                output: None
            }
        ));
    }

    #[test]
    fn test_parse_color() {
        let cli = Cli::parse_from([
            "bmcmaker",
            "color",
            "--canvas",
            "#112233",
            "--section-title",
            "",
        ]);
        assert_eq!(
            cli.action(),
            Action::SetColors(ColorChange {
                canvas: Some("#112233".to_string()),
                section_title: Some(String::new()),
                ..Default::default()
            })
        );

        let err = Cli::try_parse_from(["bmcmaker", "color", "--item", "blue"]).unwrap_err();
        assert!(err.to_string().contains("invalid color"));
        assert!(Cli::try_parse_from(["bmcmaker", "color", "--canvas", ""]).is_err());
    }

    #[test]
    fn test_parse_edit() {
        let cli = Cli::parse_from([
            "bmcmaker",
            "edit",
            "customers",
            "42",
            "--title",
            "Makers",
            "--image",
            "",
        ]);
        match cli.action() {
            Action::EditItem { section, id, edit } => {
                assert_eq!(section, SectionId::Customers);
                assert_eq!(id, "42");
                assert_eq!(edit.title.as_deref(), Some("Makers"));
                assert_eq!(edit.image.as_deref(), Some(""));
                assert_eq!(edit.description, None);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_parse_reorder() {
        let cli = Cli::parse_from(["bmcmaker", "reorder", "keyResources", "b", "a"]);
        assert_eq!(
            cli.action(),
            Action::ReorderItems {
                section: SectionId::KeyResources,
                order: vec!["b".to_string(), "a".to_string()],
            }
        );
        assert!(Cli::try_parse_from(["bmcmaker", "reorder", "keyResources"]).is_err());
    }
}
