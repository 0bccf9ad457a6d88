use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced by library operations.
///
/// A missing root or sidecar is not an error: those come back as empty
/// results or `None`.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed metadata JSON in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Writing archive {} failed: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Invalid media record: {0}")]
    InvalidRecord(&'static str),

    #[error("Unknown media type '{0}' (expected 'audio' or 'video')")]
    UnknownMediaType(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

impl LibraryError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn archive(path: &Path, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error only concerns a single file and should not abort a batch.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::InvalidRecord(_))
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
