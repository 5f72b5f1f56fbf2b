//! Scan checkpoint persistence.
//!
//! One JSON file per scan job, written atomically (temp file then rename)
//! so a crash mid-write leaves either the old checkpoint or the new one,
//! never a torn file. The checkpoint is deleted when its scan completes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::ScanOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanCheckpoint {
    pub scan_job_id: String,
    pub scan_path: String,
    pub options: ScanOptions,
    pub created_at: DateTime<Utc>,
    pub files_processed: u64,
    pub last_processed_path: Option<String>,
    /// Directories not yet processed, in traversal order. The directory
    /// containing `last_processed_path` is first.
    pub pending_directories: Vec<String>,
}

pub fn checkpoint_path(dir: &Path, job_id: &str) -> PathBuf {
    dir.join(format!("scan-{job_id}.checkpoint.json"))
}

/// Persist a checkpoint atomically.
pub fn save(dir: &Path, checkpoint: &ScanCheckpoint) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = checkpoint_path(dir, &checkpoint.scan_job_id);
    let contents = serde_json::to_string_pretty(checkpoint).map_err(std::io::Error::other)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Load the checkpoint for a job, if one exists.
pub fn load(dir: &Path, job_id: &str) -> std::io::Result<Option<ScanCheckpoint>> {
    let path = checkpoint_path(dir, job_id);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    let checkpoint = serde_json::from_str(&contents).map_err(std::io::Error::other)?;
    Ok(Some(checkpoint))
}

/// Remove a job's checkpoint. Missing files are fine.
pub fn remove(dir: &Path, job_id: &str) -> std::io::Result<()> {
    let path = checkpoint_path(dir, job_id);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(job_id: &str) -> ScanCheckpoint {
        ScanCheckpoint {
            scan_job_id: job_id.to_string(),
            scan_path: "/roms".to_string(),
            options: ScanOptions::default(),
            created_at: Utc::now(),
            files_processed: 1000,
            last_processed_path: Some("/roms/nes/file5.nes".to_string()),
            pending_directories: vec!["/roms/nes".to_string(), "/roms/snes".to_string()],
        }
    }

    #[test]
    fn test_save_load_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cp = checkpoint("job-1");

        save(dir.path(), &cp).unwrap();
        let loaded = load(dir.path(), "job-1").unwrap().unwrap();
        assert_eq!(loaded.scan_job_id, "job-1");
        assert_eq!(loaded.files_processed, 1000);
        assert_eq!(
            loaded.last_processed_path.as_deref(),
            Some("/roms/nes/file5.nes")
        );
        assert_eq!(loaded.pending_directories.len(), 2);

        remove(dir.path(), "job-1").unwrap();
        assert!(load(dir.path(), "job-1").unwrap().is_none());
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove(dir.path(), "nope").unwrap();
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), &checkpoint("job-2")).unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
