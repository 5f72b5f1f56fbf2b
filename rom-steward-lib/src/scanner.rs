//! Resumable directory scanner.
//!
//! Traversal is breadth-first over an explicit directory queue, with each
//! directory's entries handled in lexicographic order. That makes the
//! emission order deterministic, which is what makes checkpoints valid:
//! a resumed scan continues from the first entry strictly after
//! `last_processed_path` in the interrupted directory, then drains the
//! pending queue. Per-file problems become [`ScanIssue`] rows and never
//! abort the scan; only checkpoint-write failures are fatal.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use rom_steward_core::{ErrorKind, Fingerprint, ScanJob, ScanJobStatus};

use crate::archive;
use crate::buffer::BufferPool;
use crate::cache::{self, HashCache};
use crate::checkpoint::{self, ScanCheckpoint};
use crate::error::ScanAbort;
use crate::hasher;
use crate::header;
use crate::memory::MemoryMonitor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    pub recursive: bool,
    /// Filename globs; empty list matches everything.
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub scan_archive_contents: bool,
    pub max_parallel_io: usize,
    /// Skip files whose (mtime, size) matches the previous snapshot.
    pub incremental_only: bool,
    pub checkpoint_every_n: u64,
    pub compute_hashes: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            scan_archive_contents: false,
            max_parallel_io: 4,
            incremental_only: false,
            checkpoint_every_n: 1000,
            compute_hashes: true,
        }
    }
}

/// One emitted file (or archive member).
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// The on-disk file; for archive members, the archive itself.
    pub path: PathBuf,
    pub size: u64,
    /// Unix seconds of the on-disk file.
    pub mtime: i64,
    pub is_archived: bool,
    pub path_in_archive: Option<String>,
    pub fingerprint: Option<Fingerprint>,
}

/// A non-fatal problem encountered during a scan.
#[derive(Debug, Clone)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanStats {
    pub files_scanned: u64,
    pub files_skipped: u64,
    pub new_files_found: u64,
    pub modified_files_found: u64,
    pub deleted_files_detected: u64,
    pub errors: u64,
    pub bytes_scanned: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTermination {
    Completed,
    Paused,
    Cancelled,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub stats: ScanStats,
    pub issues: Vec<ScanIssue>,
    pub termination: ScanTermination,
}

/// Consumer of emitted files.
pub trait ScanSink {
    fn on_file(&mut self, file: ScannedFile);
}

impl<F: FnMut(ScannedFile)> ScanSink for F {
    fn on_file(&mut self, file: ScannedFile) {
        self(file)
    }
}

/// Previous-scan snapshot keyed by absolute path: (mtime, size).
pub type ScanSnapshot = HashMap<PathBuf, (i64, u64)>;

pub struct Scanner<'a> {
    options: ScanOptions,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    checkpoint_dir: PathBuf,
    cancel: CancellationToken,
    pause: CancellationToken,
    cache: Option<&'a HashCache>,
    memory: Option<&'a MemoryMonitor>,
    pool: BufferPool,
}

impl std::fmt::Debug for Scanner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner").finish_non_exhaustive()
    }
}

impl<'a> Scanner<'a> {
    pub fn new(options: ScanOptions, checkpoint_dir: PathBuf) -> Result<Self, ScanAbort> {
        let case_insensitive = cfg!(windows) || cfg!(target_os = "macos");
        let include = build_globset(&options.include_globs, case_insensitive)?;
        let exclude = build_globset(&options.exclude_globs, case_insensitive)?;

        Ok(Self {
            options,
            include,
            exclude,
            checkpoint_dir,
            cancel: CancellationToken::new(),
            pause: CancellationToken::new(),
            cache: None,
            memory: None,
            pool: BufferPool::default(),
        })
    }

    pub fn with_cache(mut self, cache: &'a HashCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_memory_monitor(mut self, monitor: &'a MemoryMonitor) -> Self {
        self.memory = Some(monitor);
        self
    }

    /// Token that cancels the scan at the next file boundary.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Token that pauses the scan (checkpoint is written, job goes to
    /// Paused) at the next file boundary.
    pub fn pause_token(&self) -> CancellationToken {
        self.pause.clone()
    }

    /// Parallel I/O budget after memory-pressure reduction.
    pub fn effective_parallel_io(&self) -> usize {
        match self.memory {
            Some(m) => m
                .recommended_batch_size(self.options.max_parallel_io)
                .min(self.options.max_parallel_io)
                .max(1),
            None => self.options.max_parallel_io,
        }
    }

    /// Run a fresh scan over `root`.
    pub fn run(
        &self,
        job: &mut ScanJob,
        root: &Path,
        previous: &ScanSnapshot,
        sink: &mut dyn ScanSink,
    ) -> Result<ScanOutcome, ScanAbort> {
        if !job.status.can_transition_to(ScanJobStatus::Running) {
            return Err(ScanAbort::InvalidState(format!(
                "Cannot start scan job in state '{}'",
                job.status.as_str()
            )));
        }
        if !root.is_dir() {
            job.status = ScanJobStatus::Failed;
            return Err(ScanAbort::RootNotFound(root.to_path_buf()));
        }

        job.status = ScanJobStatus::Running;
        job.started_at.get_or_insert_with(chrono::Utc::now);

        let pending = VecDeque::from([root.to_path_buf()]);
        self.traverse(job, root, pending, None, false, previous, sink)
    }

    /// Resume a paused or failed scan from its checkpoint. Never restarts
    /// from zero; the checkpoint must exist.
    pub fn resume(
        &self,
        job: &mut ScanJob,
        root: &Path,
        previous: &ScanSnapshot,
        sink: &mut dyn ScanSink,
    ) -> Result<ScanOutcome, ScanAbort> {
        if !job.status.can_transition_to(ScanJobStatus::Running) {
            return Err(ScanAbort::InvalidState(format!(
                "Cannot resume scan job in state '{}'",
                job.status.as_str()
            )));
        }
        let cp = checkpoint::load(&self.checkpoint_dir, &job.id)
            .map_err(ScanAbort::Checkpoint)?
            .ok_or_else(|| {
                ScanAbort::InvalidState(format!("No checkpoint for scan job {}", job.id))
            })?;

        job.status = ScanJobStatus::Running;
        job.resume_count += 1;

        let pending: VecDeque<PathBuf> =
            cp.pending_directories.iter().map(PathBuf::from).collect();
        self.traverse(
            job,
            root,
            pending,
            cp.last_processed_path.clone(),
            true,
            previous,
            sink,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn traverse(
        &self,
        job: &mut ScanJob,
        root: &Path,
        mut pending: VecDeque<PathBuf>,
        mut skip_until: Option<String>,
        mut resuming_first_dir: bool,
        previous: &ScanSnapshot,
        sink: &mut dyn ScanSink,
    ) -> Result<ScanOutcome, ScanAbort> {
        let mut stats = ScanStats::default();
        let mut issues: Vec<ScanIssue> = Vec::new();
        let track_deletions = !previous.is_empty();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut since_checkpoint: u64 = 0;

        while let Some(dir) = pending.pop_front() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(iter) => iter,
                Err(e) => {
                    stats.errors += 1;
                    issues.push(ScanIssue {
                        path: dir.clone(),
                        kind: ErrorKind::from_io(&e),
                        message: e.to_string(),
                    });
                    resuming_first_dir = false;
                    skip_until = None;
                    continue;
                }
            };

            let mut files: Vec<PathBuf> = Vec::new();
            let mut subdirs: Vec<PathBuf> = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                match entry.file_type() {
                    Ok(t) if t.is_dir() => subdirs.push(path),
                    Ok(t) if t.is_file() => files.push(path),
                    Ok(_) => {} // symlinks and specials are skipped
                    Err(e) => {
                        stats.errors += 1;
                        issues.push(ScanIssue {
                            path,
                            kind: ErrorKind::from_io(&e),
                            message: e.to_string(),
                        });
                    }
                }
            }
            files.sort();
            subdirs.sort();

            // Subdirectories are queued before any file is emitted, so a
            // checkpoint written mid-directory already carries them. On the
            // resumed first directory they are in the queue from the
            // checkpoint and must not be queued twice.
            if self.options.recursive && !resuming_first_dir {
                pending.extend(subdirs);
            }

            // The skip point only applies inside the directory that was
            // being processed when the checkpoint was written; a pause at
            // a directory boundary leaves last_processed_path in an
            // earlier directory.
            let skip = if resuming_first_dir {
                match skip_until.take() {
                    Some(until) if Path::new(&until).parent() == Some(dir.as_path()) => {
                        Some(until)
                    }
                    _ => None,
                }
            } else {
                None
            };
            resuming_first_dir = false;

            for file in files {
                if self.cancel.is_cancelled() {
                    job.status = ScanJobStatus::Cancelled;
                    job.completed_at = Some(chrono::Utc::now());
                    return Ok(ScanOutcome {
                        stats,
                        issues,
                        termination: ScanTermination::Cancelled,
                    });
                }
                if self.pause.is_cancelled() {
                    self.write_checkpoint(job, root, &dir, &pending)?;
                    job.status = ScanJobStatus::Paused;
                    return Ok(ScanOutcome {
                        stats,
                        issues,
                        termination: ScanTermination::Paused,
                    });
                }

                if let Some(ref until) = skip {
                    if file.to_string_lossy().as_ref() <= until.as_str() {
                        continue;
                    }
                }

                let name = match file.file_name().and_then(|n| n.to_str()) {
                    Some(n) => n.to_string(),
                    None => continue,
                };
                if !self.name_passes(&name) {
                    continue;
                }

                let meta = match std::fs::metadata(&file) {
                    Ok(m) => m,
                    Err(e) => {
                        stats.errors += 1;
                        issues.push(ScanIssue {
                            path: file.clone(),
                            kind: ErrorKind::from_io(&e),
                            message: e.to_string(),
                        });
                        continue;
                    }
                };
                let size = meta.len();
                let mtime = cache::mtime_unix(&meta);

                if track_deletions {
                    seen.insert(file.clone());
                }

                match previous.get(&file) {
                    Some(&(prev_mtime, prev_size))
                        if prev_mtime == mtime && prev_size == size =>
                    {
                        if self.options.incremental_only {
                            stats.files_skipped += 1;
                            continue;
                        }
                        // Full rescan still re-emits unchanged files
                    }
                    Some(_) => stats.modified_files_found += 1,
                    None => stats.new_files_found += 1,
                }

                let emitted = if self.options.scan_archive_contents
                    && archive::is_archive_path(&file)
                {
                    self.emit_archive_entries(&file, size, mtime, sink, &mut stats, &mut issues)
                } else {
                    self.emit_plain_file(&file, size, mtime, sink, &mut stats, &mut issues);
                    1
                };

                job.processed_items += 1;
                job.processed_bytes += size;
                job.last_processed_path = Some(file.to_string_lossy().to_string());

                since_checkpoint += emitted;
                if since_checkpoint >= self.effective_checkpoint_interval() {
                    self.write_checkpoint(job, root, &dir, &pending)?;
                    since_checkpoint = 0;
                }
            }
        }

        if track_deletions {
            stats.deleted_files_detected =
                previous.keys().filter(|p| !seen.contains(*p)).count() as u64;
        }

        checkpoint::remove(&self.checkpoint_dir, &job.id).map_err(ScanAbort::Checkpoint)?;
        job.status = ScanJobStatus::Completed;
        job.completed_at = Some(chrono::Utc::now());
        job.total_items = job.processed_items;
        job.total_bytes = job.processed_bytes;

        Ok(ScanOutcome {
            stats,
            issues,
            termination: ScanTermination::Completed,
        })
    }

    fn effective_checkpoint_interval(&self) -> u64 {
        let base = self.options.checkpoint_every_n.max(1);
        match self.memory {
            Some(m) => m.recommended_batch_size(base as usize) as u64,
            None => base,
        }
    }

    fn name_passes(&self, name: &str) -> bool {
        if let Some(ref include) = self.include {
            if !include.is_match(name) {
                return false;
            }
        }
        if let Some(ref exclude) = self.exclude {
            if exclude.is_match(name) {
                return false;
            }
        }
        true
    }

    fn emit_plain_file(
        &self,
        file: &Path,
        size: u64,
        mtime: i64,
        sink: &mut dyn ScanSink,
        stats: &mut ScanStats,
        issues: &mut Vec<ScanIssue>,
    ) {
        let fingerprint = if self.options.compute_hashes {
            self.fingerprint_file(file, mtime, size, stats, issues)
        } else {
            None
        };

        stats.files_scanned += 1;
        stats.bytes_scanned += size;
        sink.on_file(ScannedFile {
            path: file.to_path_buf(),
            size,
            mtime,
            is_archived: false,
            path_in_archive: None,
            fingerprint,
        });
    }

    /// Emit every member of an archive. Returns the number of emitted
    /// records; a listing failure emits nothing and records an issue.
    fn emit_archive_entries(
        &self,
        file: &Path,
        _archive_size: u64,
        mtime: i64,
        sink: &mut dyn ScanSink,
        stats: &mut ScanStats,
        issues: &mut Vec<ScanIssue>,
    ) -> u64 {
        let entries = match archive::list_entries(file) {
            Ok(entries) => entries,
            Err(e) => {
                stats.errors += 1;
                issues.push(ScanIssue {
                    path: file.to_path_buf(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
                return 0;
            }
        };

        let mut emitted = 0u64;
        for entry in entries {
            let fingerprint = if self.options.compute_hashes {
                match archive::hash_entry(
                    file,
                    &entry.path_in_archive,
                    0,
                    &self.pool,
                    None,
                    &self.cancel,
                ) {
                    Ok(out) => Some(out.fingerprint),
                    Err(e) => {
                        stats.errors += 1;
                        issues.push(ScanIssue {
                            path: file.join(&entry.path_in_archive),
                            kind: e.kind(),
                            message: e.to_string(),
                        });
                        None
                    }
                }
            } else {
                None
            };

            stats.files_scanned += 1;
            stats.bytes_scanned += entry.size;
            sink.on_file(ScannedFile {
                path: file.to_path_buf(),
                size: entry.size,
                mtime,
                is_archived: true,
                path_in_archive: Some(entry.path_in_archive),
                fingerprint,
            });
            emitted += 1;
        }
        emitted
    }

    fn fingerprint_file(
        &self,
        file: &Path,
        mtime: i64,
        size: u64,
        stats: &mut ScanStats,
        issues: &mut Vec<ScanIssue>,
    ) -> Option<Fingerprint> {
        if let Some(cache) = self.cache {
            if let Some(hit) = cache.get_cached(file) {
                return Some(hit);
            }
        }

        // Copier headers are excluded so the fingerprint matches catalogs
        let skip = header::skip_for_file(file, size);
        match hasher::hash_file(file, skip, &self.pool, None, &self.cancel) {
            Ok(out) => {
                if let Some(cache) = self.cache {
                    cache.publish(file, out.fingerprint.clone(), mtime, size);
                }
                Some(out.fingerprint)
            }
            Err(e) => {
                stats.errors += 1;
                issues.push(ScanIssue {
                    path: file.to_path_buf(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    fn write_checkpoint(
        &self,
        job: &ScanJob,
        root: &Path,
        current_dir: &Path,
        pending: &VecDeque<PathBuf>,
    ) -> Result<(), ScanAbort> {
        let mut pending_directories =
            vec![current_dir.to_string_lossy().to_string()];
        pending_directories.extend(pending.iter().map(|p| p.to_string_lossy().to_string()));

        let cp = ScanCheckpoint {
            scan_job_id: job.id.clone(),
            scan_path: root.to_string_lossy().to_string(),
            options: self.options.clone(),
            created_at: chrono::Utc::now(),
            files_processed: job.processed_items,
            last_processed_path: job.last_processed_path.clone(),
            pending_directories,
        };
        checkpoint::save(&self.checkpoint_dir, &cp).map_err(ScanAbort::Checkpoint)
    }
}

fn build_globset(
    patterns: &[String],
    case_insensitive: bool,
) -> Result<Option<GlobSet>, ScanAbort> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| ScanAbort::GlobParse {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|e| ScanAbort::GlobParse {
        pattern: patterns.join(","),
        message: e.to_string(),
    })?;
    Ok(Some(set))
}

#[cfg(test)]
#[path = "tests/scanner_tests.rs"]
mod tests;
