//! Hash cache keyed by absolute path.
//!
//! A record is valid only while the file keeps the recorded (mtime, size);
//! `get_cached` revalidates on every read and evicts on mismatch, so a
//! stale cache file can never produce a wrong fingerprint. The cache is
//! per-process: it loads once at startup and saves atomically
//! (write-temp-then-rename) on demand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use rom_steward_core::Fingerprint;

/// Bump to invalidate previously written cache files wholesale.
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub fingerprint: Fingerprint,
    /// Unix seconds.
    pub mtime: i64,
    pub size: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    records: HashMap<PathBuf, CacheRecord>,
}

pub struct HashCache {
    records: RwLock<HashMap<PathBuf, CacheRecord>>,
    file_path: Option<PathBuf>,
}

impl HashCache {
    /// An unpersisted cache.
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            file_path: None,
        }
    }

    /// Load from a cache file, starting empty when the file is missing,
    /// unreadable, or from a different cache version.
    pub fn load(file_path: PathBuf) -> Self {
        let records = match std::fs::read_to_string(&file_path) {
            Ok(contents) => match serde_json::from_str::<CacheFile>(&contents) {
                Ok(file) if file.version == CACHE_VERSION => file.records,
                Ok(_) => {
                    log::info!("Hash cache version changed, starting fresh");
                    HashMap::new()
                }
                Err(e) => {
                    log::warn!("Hash cache unreadable ({e}), starting fresh");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            records: RwLock::new(records),
            file_path: Some(file_path),
        }
    }

    /// Look up a fingerprint for `path`, revalidating against the file's
    /// current mtime and size. A mismatch evicts the record.
    pub fn get_cached(&self, path: &Path) -> Option<Fingerprint> {
        let record = {
            let records = self.records.read().unwrap_or_else(|e| e.into_inner());
            records.get(path).cloned()?
        };

        match stat_key(path) {
            Some((mtime, size)) if mtime == record.mtime && size == record.size => {
                Some(record.fingerprint)
            }
            _ => {
                self.evict(path);
                None
            }
        }
    }

    /// Publish a computed fingerprint. Idempotent by path key.
    pub fn publish(&self, path: &Path, fingerprint: Fingerprint, mtime: i64, size: u64) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(
            path.to_path_buf(),
            CacheRecord {
                fingerprint,
                mtime,
                size,
            },
        );
    }

    pub fn evict(&self, path: &Path) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.remove(path);
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the cache file atomically. No-op for in-memory caches.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(ref path) = self.file_path else {
            return Ok(());
        };

        let file = CacheFile {
            version: CACHE_VERSION,
            records: self
                .records
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string(&file).map_err(std::io::Error::other)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// The (mtime, size) validity key for a path, if it can be stat'ed.
pub fn stat_key(path: &Path) -> Option<(i64, u64)> {
    let meta = std::fs::metadata(path).ok()?;
    Some((mtime_unix(&meta), meta.len()))
}

/// Modification time as unix seconds.
pub fn mtime_unix(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
