use std::path::PathBuf;

use thiserror::Error;

use rom_steward_core::ErrorKind;

/// Errors raised while detecting or parsing DAT files.
#[derive(Debug, Error)]
pub enum DatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid DAT file: {0}")]
    InvalidDat(String),

    #[error("Unsupported DAT format{}", path_suffix(.0))]
    UnsupportedFormat(Option<PathBuf>),
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(": {}", p.display()),
        None => String::new(),
    }
}

impl DatError {
    pub fn invalid_dat(msg: impl Into<String>) -> Self {
        Self::InvalidDat(msg.into())
    }

    pub fn unsupported(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedFormat(Some(path.into()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DatError::Io(e) => ErrorKind::from_io(e),
            DatError::Xml(_) | DatError::InvalidDat(_) => ErrorKind::ParseError,
            DatError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for DatError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        DatError::InvalidDat(format!("Bad XML attribute: {e}"))
    }
}
