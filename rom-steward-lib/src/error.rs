use std::path::PathBuf;

use thiserror::Error;

use rom_steward_core::ErrorKind;

/// Errors from hashing, header detection, and archive reading.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Stream ended early: needed {needed} bytes, got {got}")]
    ShortInput { needed: u64, got: u64 },

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Archive tool failed: {0}")]
    Tool(String),

    #[error("Archive entry not found: {entry} in {archive}")]
    EntryNotFound { archive: PathBuf, entry: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HashError {
    /// Wrap an I/O error with path context so not-found and permission
    /// failures keep their subject.
    pub fn from_io_at(err: std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HashError::NotFound(_) => ErrorKind::NotFound,
            HashError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            HashError::ShortInput { .. } => ErrorKind::ShortInput,
            HashError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            HashError::Tool(_) => ErrorKind::Io,
            HashError::EntryNotFound { .. } => ErrorKind::NotFound,
            HashError::Cancelled => ErrorKind::Cancelled,
            HashError::Io(e) => ErrorKind::from_io(e),
        }
    }
}

/// Fatal scanner failures. Per-file problems become `ScanIssue` rows and
/// never abort a scan; these do.
#[derive(Debug, Error)]
pub enum ScanAbort {
    #[error("Invalid glob pattern '{pattern}': {message}")]
    GlobParse { pattern: String, message: String },

    #[error("Checkpoint write failed: {0}")]
    Checkpoint(std::io::Error),

    #[error("Scan root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Invalid job state: {0}")]
    InvalidState(String),
}

impl ScanAbort {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanAbort::GlobParse { .. } => ErrorKind::ParseError,
            ScanAbort::Checkpoint(_) => ErrorKind::Io,
            ScanAbort::RootNotFound(_) => ErrorKind::NotFound,
            ScanAbort::InvalidState(_) => ErrorKind::Internal,
        }
    }
}
