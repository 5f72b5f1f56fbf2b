//! Import pipelines and the verification service.
//!
//! Three flows feed the store: DAT files become catalogs (chunked bulk
//! insert), scan emissions become stored ROM files (batched upserts),
//! and verification joins stored files against catalog entries by
//! fingerprint tier.

pub mod dat_import;
pub mod progress;
pub mod scan_import;
pub mod verify;

pub use dat_import::{import_dat_file, ImportError, ImportOutcome, ImportStats};
pub use progress::{ImportProgress, LogProgress, SilentProgress};
pub use scan_import::{ScanPersister, ScanPersistStats};
pub use verify::{
    verify_fingerprint, verify_volume, BadDumpSource, VerificationOutcome, VerifyStats,
};
