//! The `scan` command.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use rom_steward_core::{ScanJob, ScanJobKind, ScanJobStatus, Volume, VolumeKind};
use rom_steward_import::ScanPersister;
use rom_steward_lib::{checkpoint, ScanOptions, ScanSink, ScanTermination, ScannedFile, Scanner};

use crate::context::AppContext;
use crate::{EXIT_OK, EXIT_PARTIAL, EXIT_RUNTIME};

pub(crate) struct ScanArgs {
    pub path: PathBuf,
    pub incremental: bool,
    pub archives: bool,
    pub parallel: usize,
    pub no_hash: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub resume: Option<String>,
    pub label: Option<String>,
}

struct ProgressSink<'a, 'b> {
    inner: &'b mut ScanPersister<'a>,
    bar: &'b ProgressBar,
}

impl ScanSink for ProgressSink<'_, '_> {
    fn on_file(&mut self, file: ScannedFile) {
        self.bar.inc(1);
        if let Some(name) = file.path.file_name().and_then(|n| n.to_str()) {
            self.bar.set_message(name.to_string());
        }
        self.inner.on_file(file);
    }
}

pub(crate) fn run(ctx: &AppContext, args: ScanArgs) -> i32 {
    let root = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            log::error!("Cannot access {}: {e}", args.path.display());
            return EXIT_RUNTIME;
        }
    };

    let volume = match find_or_register_volume(ctx, &root, args.label.as_deref()) {
        Ok(v) => v,
        Err(e) => {
            log::error!("{e}");
            return EXIT_RUNTIME;
        }
    };

    // One active job per volume
    let mut job = match prepare_job(ctx, &volume, &root, &args) {
        Ok(job) => job,
        Err(e) => {
            log::error!("{e}");
            return EXIT_RUNTIME;
        }
    };
    let resuming = args.resume.is_some();

    let options = match scan_options(ctx, &job, &args, resuming) {
        Ok(o) => o,
        Err(e) => {
            log::error!("{e}");
            return EXIT_RUNTIME;
        }
    };

    let scanner = match Scanner::new(options, ctx.checkpoint_dir()) {
        Ok(s) => s.with_cache(&ctx.cache).with_memory_monitor(&ctx.memory),
        Err(e) => {
            log::error!("Scan setup failed: {e}");
            return EXIT_RUNTIME;
        }
    };
    log::debug!(
        "Parallel I/O budget: {} (memory pressure: {})",
        scanner.effective_parallel_io(),
        ctx.memory.current_level().as_str()
    );

    let previous = if args.incremental {
        match rom_steward_db::rom_file_snapshot(&ctx.conn, &volume.id, &root) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Cannot load previous scan state: {e}");
                return EXIT_RUNTIME;
            }
        }
    } else {
        Default::default()
    };

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {pos} files  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let mut persister =
        ScanPersister::new(&ctx.conn, &volume).with_memory_monitor(&ctx.memory);
    let outcome = {
        let mut sink = ProgressSink {
            inner: &mut persister,
            bar: &bar,
        };
        if resuming {
            scanner.resume(&mut job, &root, &previous, &mut sink)
        } else {
            scanner.run(&mut job, &root, &previous, &mut sink)
        }
    };
    bar.finish_and_clear();

    let outcome = match outcome {
        Ok(o) => o,
        Err(e) => {
            job.status = ScanJobStatus::Failed;
            let _ = rom_steward_db::update_scan_job(&ctx.conn, &job);
            log::error!("Scan failed: {e}");
            return EXIT_RUNTIME;
        }
    };

    if let Err(e) = rom_steward_db::update_scan_job(&ctx.conn, &job) {
        log::warn!("Could not persist scan job state: {e}");
    }

    // Prune stale records only after a complete, unfiltered full scan
    let full_sweep = outcome.termination == ScanTermination::Completed
        && !args.incremental
        && args.include.is_empty()
        && args.exclude.is_empty();
    let persist = if full_sweep {
        persister.finish_and_prune()
    } else {
        persister.finish()
    };
    let persist = match persist {
        Ok(stats) => stats,
        Err(e) => {
            log::error!("Failed to persist scan results: {e}");
            return EXIT_RUNTIME;
        }
    };
    ctx.save_cache();

    let stats = outcome.stats;
    log::info!(
        "{} {} files scanned, {} skipped, {} new, {} modified, {} deleted",
        "Scan:".bold().to_string(),
        stats.files_scanned,
        stats.files_skipped,
        stats.new_files_found,
        stats.modified_files_found,
        stats.deleted_files_detected
    );
    log::info!(
        "       {} persisted, {} pruned, {} bytes",
        persist.files_persisted,
        persist.pruned,
        super::format_bytes(stats.bytes_scanned)
    );
    for issue in &outcome.issues {
        log::warn!("  {}: {} ({})", issue.path.display(), issue.message, issue.kind);
    }

    match outcome.termination {
        ScanTermination::Paused => {
            log::info!("Scan paused; resume with --resume {}", job.id);
            EXIT_OK
        }
        ScanTermination::Cancelled => {
            log::warn!("Scan cancelled after {} files", stats.files_scanned);
            EXIT_RUNTIME
        }
        ScanTermination::Completed if stats.errors > 0 => EXIT_PARTIAL,
        ScanTermination::Completed => EXIT_OK,
    }
}

fn find_or_register_volume(
    ctx: &AppContext,
    root: &Path,
    label: Option<&str>,
) -> Result<Volume, String> {
    let root_str = root.to_string_lossy().to_string();
    let volumes =
        rom_steward_db::list_volumes(&ctx.conn).map_err(|e| format!("Volume query failed: {e}"))?;
    if let Some(existing) = volumes.into_iter().find(|v| v.root_path == root_str) {
        return Ok(existing);
    }

    let label = label
        .map(|s| s.to_string())
        .or_else(|| {
            root.file_name()
                .and_then(|n| n.to_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| root_str.clone());
    let volume = Volume {
        id: uuid::Uuid::new_v4().to_string(),
        label,
        root_path: root_str,
        kind: VolumeKind::Fixed,
        is_online: true,
        last_seen_at: chrono::Utc::now(),
        total_size: None,
        free_space: None,
        auto_scan: false,
    };
    rom_steward_db::upsert_volume(&ctx.conn, &volume)
        .map_err(|e| format!("Volume registration failed: {e}"))?;
    log::info!("Registered volume '{}' ({})", volume.label, volume.id);
    Ok(volume)
}

fn prepare_job(
    ctx: &AppContext,
    volume: &Volume,
    root: &Path,
    args: &ScanArgs,
) -> Result<ScanJob, String> {
    if let Some(ref job_id) = args.resume {
        let job = rom_steward_db::get_scan_job(&ctx.conn, job_id)
            .map_err(|e| format!("Job query failed: {e}"))?
            .ok_or_else(|| format!("No scan job {job_id}"))?;
        if !matches!(job.status, ScanJobStatus::Paused | ScanJobStatus::Failed) {
            return Err(format!(
                "Job {job_id} is {}, only paused or failed jobs resume",
                job.status.as_str()
            ));
        }
        return Ok(job);
    }

    let active = rom_steward_db::has_active_job_for_volume(&ctx.conn, &volume.id)
        .map_err(|e| format!("Job query failed: {e}"))?;
    if active {
        return Err(format!(
            "Volume '{}' already has an active scan job",
            volume.label
        ));
    }

    let job = ScanJob {
        id: uuid::Uuid::new_v4().to_string(),
        kind: if args.incremental {
            ScanJobKind::Incremental
        } else {
            ScanJobKind::Full
        },
        target_volume_id: Some(volume.id.clone()),
        target_path: Some(root.to_string_lossy().to_string()),
        status: ScanJobStatus::Queued,
        queued_at: chrono::Utc::now(),
        started_at: None,
        completed_at: None,
        processed_items: 0,
        total_items: 0,
        processed_bytes: 0,
        total_bytes: 0,
        last_processed_path: None,
        resume_count: 0,
        phase: None,
    };
    rom_steward_db::insert_scan_job(&ctx.conn, &job)
        .map_err(|e| format!("Job insert failed: {e}"))?;
    Ok(job)
}

/// Options for this run. A resumed job reuses the options persisted in
/// its checkpoint so filters and flags cannot drift mid-job.
fn scan_options(
    ctx: &AppContext,
    job: &ScanJob,
    args: &ScanArgs,
    resuming: bool,
) -> Result<ScanOptions, String> {
    if resuming {
        let cp = checkpoint::load(&ctx.checkpoint_dir(), &job.id)
            .map_err(|e| format!("Cannot read checkpoint: {e}"))?
            .ok_or_else(|| format!("No checkpoint for job {}", job.id))?;
        return Ok(cp.options);
    }

    Ok(ScanOptions {
        recursive: true,
        include_globs: args.include.clone(),
        exclude_globs: args.exclude.clone(),
        scan_archive_contents: args.archives,
        max_parallel_io: args.parallel.max(1),
        incremental_only: args.incremental,
        checkpoint_every_n: 1000,
        compute_hashes: !args.no_hash,
    })
}
