//! The error-kind taxonomy shared across crates.
//!
//! Each crate defines its own `thiserror` enum for rich context, but every
//! error maps onto one of these kinds via a `kind()` accessor so callers
//! (CLI exit codes, reporters) can classify failures uniformly.

use serde::{Deserialize, Serialize};

/// Coarse classification of any error in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Path or entity does not exist.
    NotFound,
    /// The OS refused access.
    PermissionDenied,
    /// Archive or DAT format not recognized.
    UnsupportedFormat,
    /// Malformed DAT, template, or other structured input.
    ParseError,
    /// Stream ended before the required bytes were read.
    ShortInput,
    /// Recomputed hash disagrees with cache or catalog.
    HashMismatch,
    /// Destination exists, or an active job already holds the resource.
    Conflict,
    /// Cooperative cancellation was observed.
    Cancelled,
    /// Underlying I/O failure not covered above.
    Io,
    /// A programmer-error invariant was violated.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::ShortInput => "short_input",
            ErrorKind::HashMismatch => "hash_mismatch",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Io => "io_error",
            ErrorKind::Internal => "internal",
        }
    }

    /// Classify a `std::io::Error` into the taxonomy.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::UnexpectedEof => ErrorKind::ShortInput,
            _ => ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
