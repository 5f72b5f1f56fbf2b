//! Core domain types shared across the rom-steward workspace.
//!
//! Everything here is plain data: the hash fingerprint, catalog and
//! collection models, job records, and the error-kind taxonomy. Engines
//! (scanner, hasher, organizer) and the persistence layer live in the
//! sibling crates and exchange these types by value or by stable id.

pub mod error;
pub mod fingerprint;
pub mod types;

pub use error::ErrorKind;
pub use fingerprint::{Fingerprint, FingerprintError, MatchTier};
pub use types::*;
