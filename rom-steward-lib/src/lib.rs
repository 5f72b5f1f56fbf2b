//! The scan/hash engine.
//!
//! This crate owns everything between the filesystem and the catalog
//! store: the streaming multi-digest hasher, copier-header detection,
//! archive adapters, the priority hash-job pool, the (mtime, size)
//! revalidating hash cache, the resumable directory scanner, and the
//! memory-pressure monitor that throttles batch sizes.

pub mod archive;
pub mod buffer;
pub mod cache;
pub mod checkpoint;
pub mod error;
pub mod hasher;
pub mod header;
pub mod job_pool;
pub mod memory;
pub mod scanner;
pub mod settings;

pub use buffer::BufferPool;
pub use cache::HashCache;
pub use checkpoint::ScanCheckpoint;
pub use error::{HashError, ScanAbort};
pub use hasher::{HashOutput, ReadSeek, CHUNK_SIZE};
pub use header::HeaderInfo;
pub use job_pool::{HashJob, HashJobPool, HashPoolConfig, PoolEvent};
pub use memory::{MemoryMonitor, PressureLevel};
pub use scanner::{ScanOptions, ScanOutcome, ScanSink, ScanTermination, ScannedFile, Scanner};
