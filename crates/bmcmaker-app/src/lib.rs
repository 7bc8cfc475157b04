//! BMC Maker Application
//!
//! Command-line shell over the canvas store, share links, file
//! import/export and artifact export.

mod app;
mod cli;
mod clipboard;
mod notify;

pub use app::{Action, App, AppConfig, AppError, AppResult, ColorChange, ItemEdit};
pub use cli::{Cli, Command, FormatArg};
pub use clipboard::SystemClipboard;
pub use notify::{Level, Notification};
