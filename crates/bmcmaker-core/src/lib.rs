//! BMC Maker Core Library
//!
//! Platform-agnostic canvas model, state codec, share links and file
//! import/export for the business model canvas maker.

pub mod canvas;
pub mod clipboard;
pub mod codec;
pub mod files;
pub mod share;
pub mod store;

pub use canvas::{CanvasSnapshot, Item, ItemIdGenerator, SectionId, ValidationError};
pub use clipboard::{BoxFuture, Clipboard, ClipboardError, MemoryClipboard};
pub use codec::{
    CanvasDocument, DecodeError, DecodedShare, ParseError, SharePayload, decode_full,
    decode_share, encode_full, encode_share, parse_document,
};
pub use files::{DEFAULT_FILE_NAME, FileError, ImportOutcome};
pub use share::{LoadOutcome, ShareLink, ShareLinkService, load_from_url};
pub use store::{CanvasStore, ItemDraft};
