//! Persist scanner emissions as stored ROM files.
//!
//! A [`ScanPersister`] plugs into the scanner as its sink, converts
//! emitted files to store rows, and flushes them in batches sized by the
//! memory monitor. After a full traversal, records for files that no
//! longer exist on the volume can be pruned.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rom_steward_core::{StoredRomFile, VerificationStatus, Volume};
use rom_steward_db::{operations, Connection, OperationError, ROM_FILE_CHUNK_SIZE};
use rom_steward_lib::{MemoryMonitor, ScanSink, ScannedFile};

#[derive(Debug, Default, Clone, Copy)]
pub struct ScanPersistStats {
    pub files_persisted: u64,
    pub batches_flushed: u64,
    pub errors: u64,
    pub pruned: u64,
}

pub struct ScanPersister<'a> {
    conn: &'a Connection,
    volume_id: String,
    volume_root: PathBuf,
    batch: Vec<StoredRomFile>,
    batch_size: usize,
    memory: Option<&'a MemoryMonitor>,
    seen: HashSet<String>,
    stats: ScanPersistStats,
}

impl<'a> ScanPersister<'a> {
    pub fn new(conn: &'a Connection, volume: &Volume) -> Self {
        Self {
            conn,
            volume_id: volume.id.clone(),
            volume_root: PathBuf::from(&volume.root_path),
            batch: Vec::new(),
            batch_size: ROM_FILE_CHUNK_SIZE,
            memory: None,
            seen: HashSet::new(),
            stats: ScanPersistStats::default(),
        }
    }

    pub fn with_memory_monitor(mut self, monitor: &'a MemoryMonitor) -> Self {
        self.memory = Some(monitor);
        self
    }

    fn effective_batch_size(&self) -> usize {
        match self.memory {
            Some(m) => m.recommended_batch_size(self.batch_size),
            None => self.batch_size,
        }
    }

    fn to_stored(&self, file: &ScannedFile) -> Option<StoredRomFile> {
        let relative = file
            .path
            .strip_prefix(&self.volume_root)
            .unwrap_or(&file.path)
            .to_string_lossy()
            .to_string();
        let filename = match &file.path_in_archive {
            Some(inner) => Path::new(inner)
                .file_name()
                .and_then(|n| n.to_str())?
                .to_string(),
            None => file.path.file_name().and_then(|n| n.to_str())?.to_string(),
        };

        let now = chrono::Utc::now();
        Some(StoredRomFile {
            id: uuid::Uuid::new_v4().to_string(),
            volume_id: self.volume_id.clone(),
            relative_path: relative.clone(),
            filename,
            size: file.size,
            fingerprint: file.fingerprint.clone(),
            scanned_at: now,
            hashed_at: file.fingerprint.as_ref().map(|_| now),
            last_modified: file.mtime,
            is_archived: file.is_archived,
            archive_path: file.is_archived.then(|| relative.clone()),
            path_in_archive: file.path_in_archive.clone(),
            verification_status: VerificationStatus::Unknown,
            matched_catalog_id: None,
            matched_entry_id: None,
        })
    }

    fn identity(relative: &str, path_in_archive: Option<&str>) -> String {
        match path_in_archive {
            Some(inner) => format!("{relative}\u{0}{inner}"),
            None => relative.to_string(),
        }
    }

    /// Flush the pending batch.
    pub fn flush(&mut self) -> Result<(), OperationError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        let stats = operations::bulk_insert_rom_files(
            self.conn,
            &batch,
            self.effective_batch_size(),
            None,
        )?;
        self.stats.files_persisted += stats.inserted;
        self.stats.errors += stats.errors;
        self.stats.batches_flushed += 1;
        Ok(())
    }

    /// Flush and return the final stats.
    pub fn finish(mut self) -> Result<ScanPersistStats, OperationError> {
        self.flush()?;
        Ok(self.stats)
    }

    /// Flush, then delete records for files the scan never saw. Only
    /// valid after a complete (non-incremental, non-filtered) traversal.
    pub fn finish_and_prune(mut self) -> Result<ScanPersistStats, OperationError> {
        self.flush()?;

        let existing = rom_steward_db::rom_files_for_volume(self.conn, &self.volume_id)?;
        let stale: Vec<String> = existing
            .iter()
            .filter(|f| {
                !self.seen.contains(&Self::identity(
                    &f.relative_path,
                    f.path_in_archive.as_deref(),
                ))
            })
            .map(|f| f.id.clone())
            .collect();

        if !stale.is_empty() {
            self.stats.pruned = operations::delete_rom_files(self.conn, &stale)?;
        }
        Ok(self.stats)
    }
}

impl ScanSink for ScanPersister<'_> {
    fn on_file(&mut self, file: ScannedFile) {
        let Some(stored) = self.to_stored(&file) else {
            self.stats.errors += 1;
            return;
        };
        self.seen.insert(Self::identity(
            &stored.relative_path,
            stored.path_in_archive.as_deref(),
        ));
        self.batch.push(stored);

        if self.batch.len() >= self.effective_batch_size() {
            if let Err(e) = self.flush() {
                log::error!("Failed to persist scan batch: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rom_steward_core::VolumeKind;
    use rom_steward_db::open_memory;

    fn volume(root: &Path) -> Volume {
        Volume {
            id: "v1".to_string(),
            label: "test".to_string(),
            root_path: root.to_string_lossy().to_string(),
            kind: VolumeKind::Fixed,
            is_online: true,
            last_seen_at: Utc::now(),
            total_size: None,
            free_space: None,
            auto_scan: false,
        }
    }

    fn scanned(root: &Path, rel: &str, size: u64) -> ScannedFile {
        ScannedFile {
            path: root.join(rel),
            size,
            mtime: 1700000000,
            is_archived: false,
            path_in_archive: None,
            fingerprint: None,
        }
    }

    #[test]
    fn test_persist_emissions() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory().unwrap();
        let vol = volume(dir.path());
        operations::upsert_volume(&conn, &vol).unwrap();

        let mut persister = ScanPersister::new(&conn, &vol);
        persister.on_file(scanned(dir.path(), "nes/a.nes", 10));
        persister.on_file(scanned(dir.path(), "nes/b.nes", 20));
        let stats = persister.finish().unwrap();

        assert_eq!(stats.files_persisted, 2);
        let files = rom_steward_db::rom_files_for_volume(&conn, "v1").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].relative_path, "nes/a.nes");
        assert_eq!(files[0].filename, "a.nes");
        assert!(!files[0].is_archived);
    }

    #[test]
    fn test_archive_members_keep_identity() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory().unwrap();
        let vol = volume(dir.path());
        operations::upsert_volume(&conn, &vol).unwrap();

        let mut persister = ScanPersister::new(&conn, &vol);
        for inner in ["one.nes", "two.nes"] {
            persister.on_file(ScannedFile {
                path: dir.path().join("pack.zip"),
                size: 5,
                mtime: 1,
                is_archived: true,
                path_in_archive: Some(inner.to_string()),
                fingerprint: None,
            });
        }
        let stats = persister.finish().unwrap();
        assert_eq!(stats.files_persisted, 2);

        let files = rom_steward_db::rom_files_for_volume(&conn, "v1").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.is_archived
            && f.archive_path.as_deref() == Some("pack.zip")
            && f.path_in_archive.is_some()));
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory().unwrap();
        let vol = volume(dir.path());
        operations::upsert_volume(&conn, &vol).unwrap();

        for _ in 0..2 {
            let mut persister = ScanPersister::new(&conn, &vol);
            persister.on_file(scanned(dir.path(), "a.nes", 10));
            persister.finish().unwrap();
        }

        let files = rom_steward_db::rom_files_for_volume(&conn, "v1").unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_prune_removes_vanished_files() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory().unwrap();
        let vol = volume(dir.path());
        operations::upsert_volume(&conn, &vol).unwrap();

        let mut persister = ScanPersister::new(&conn, &vol);
        persister.on_file(scanned(dir.path(), "a.nes", 10));
        persister.on_file(scanned(dir.path(), "b.nes", 20));
        persister.finish().unwrap();

        // Second scan only sees a.nes
        let mut persister = ScanPersister::new(&conn, &vol);
        persister.on_file(scanned(dir.path(), "a.nes", 10));
        let stats = persister.finish_and_prune().unwrap();

        assert_eq!(stats.pruned, 1);
        let files = rom_steward_db::rom_files_for_volume(&conn, "v1").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "a.nes");
    }
}
