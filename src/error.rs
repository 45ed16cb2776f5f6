//! Error types shared by every reader.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Errors that can occur while discovering or reading channel data
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Malformed or unsupported container structure (TDM index, PLC header)
    #[error("Format error: {0}")]
    Format(String),

    /// Requested group, channel, table or column does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// One file of a multi-file read failed; the whole read is abandoned
    #[error("Failed to read {path}: {source}")]
    PartialRead {
        path: PathBuf,
        #[source]
        source: Box<ReaderError>,
    },

    /// Raw timestamp cannot be represented as an instant
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ReaderError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        ReaderError::Format(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        ReaderError::NotFound(msg.into())
    }

    /// Whether the error (or the failure it wraps) is a missing group/channel
    pub fn is_not_found(&self) -> bool {
        match self {
            ReaderError::NotFound(_) => true,
            ReaderError::PartialRead { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for ReaderError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ReaderError::Xml(err.into())
    }
}
