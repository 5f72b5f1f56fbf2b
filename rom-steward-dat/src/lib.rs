//! DAT file parsers.
//!
//! Two formats are supported: Logiqx XML (`datafile`/`game`/`rom`) and
//! ClrMamePro brace-delimited text. Both parsers stream their input with
//! bounded memory and produce the same normalized [`DatFile`] aggregate.
//! Format detection goes by extension first, then a content probe.

pub mod clrmamepro;
pub mod detect;
pub mod error;
pub mod logiqx;
pub mod model;

pub use detect::{detect_format, parse_dat_file, DatFormat};
pub use error::DatError;
pub use model::{DatFile, DatGame, DatHeader, DatRom, ProgressFn};
