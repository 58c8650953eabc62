// Project persistence - key-value store of a composition, its JSON codec
// and tar archive import/export

pub mod archive;
pub mod codec;
pub mod keys;
pub mod store;

pub use archive::{ArchiveFormat, ArchiveKind, Compression, Member};
pub use codec::{LoadReport, load_module, save_module};
pub use store::{DirStore, MemoryStore, Store};

use std::path::PathBuf;

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// Stored data is malformed or out of bounds; the key reads as missing
    #[error("Malformed data in {key}: {reason}")]
    StoreFormat { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown archive format: {}", .0.display())]
    UnknownArchiveFormat(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid store key: {0}")]
    InvalidKey(String),
}
