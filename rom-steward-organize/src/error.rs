use std::path::PathBuf;

use thiserror::Error;

use rom_steward_core::ErrorKind;

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("Template parse error: {0}")]
    TemplateParse(String),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    GlobParse { pattern: String, message: String },

    #[error("Source path not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Operation {0} cannot be rolled back")]
    NotRollbackable(String),

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrganizeError {
    pub fn template_parse(msg: impl Into<String>) -> Self {
        Self::TemplateParse(msg.into())
    }

    pub fn journal(msg: impl Into<String>) -> Self {
        Self::Journal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrganizeError::TemplateParse(_) | OrganizeError::GlobParse { .. } => {
                ErrorKind::ParseError
            }
            OrganizeError::SourceNotFound(_) | OrganizeError::OperationNotFound(_) => {
                ErrorKind::NotFound
            }
            OrganizeError::NotRollbackable(_) => ErrorKind::Conflict,
            OrganizeError::Journal(_) => ErrorKind::Io,
            OrganizeError::Io(e) => ErrorKind::from_io(e),
        }
    }
}
