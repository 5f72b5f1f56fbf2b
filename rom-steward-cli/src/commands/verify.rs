//! The `verify` command.
//!
//! Two phases per volume: files that were scanned without hashes (and
//! still exist on disk) are pushed through the hash-job pool first, then
//! every stored file is checked against the imported catalogs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use owo_colors::OwoColorize;

use rom_steward_core::{HashJobState, HashPriority, Volume};
use rom_steward_import::verify_volume;
use rom_steward_lib::{HashCache, HashJobPool, HashPoolConfig};

use crate::context::AppContext;
use crate::{EXIT_OK, EXIT_PARTIAL, EXIT_RUNTIME};

pub(crate) fn run(ctx: &AppContext, volume_id: Option<&str>) -> i32 {
    let volumes = match selected_volumes(ctx, volume_id) {
        Ok(v) => v,
        Err(e) => {
            log::error!("{e}");
            return EXIT_RUNTIME;
        }
    };
    if volumes.is_empty() {
        log::warn!("No volumes registered; run `rom-steward scan <path>` first");
        return EXIT_OK;
    }

    let mut hash_errors = 0u64;
    let mut any_failure = false;
    for volume in &volumes {
        if !volume.is_online {
            log::warn!("Skipping offline volume '{}'", volume.label);
            continue;
        }

        hash_errors += hash_missing(ctx, volume);

        match verify_volume(&ctx.conn, &volume.id, None) {
            Ok(stats) => {
                log::info!(
                    "{} '{}': {} verified, {} bad dumps, {} not in catalog, {} unhashed",
                    "Verify".bold().to_string(),
                    volume.label,
                    stats.verified,
                    stats.bad_dumps,
                    stats.not_in_catalog,
                    stats.unhashed
                );
            }
            Err(e) => {
                log::error!("Verification failed for '{}': {e}", volume.label);
                any_failure = true;
            }
        }
    }
    ctx.save_cache();

    if any_failure {
        EXIT_RUNTIME
    } else if hash_errors > 0 {
        EXIT_PARTIAL
    } else {
        EXIT_OK
    }
}

fn selected_volumes(ctx: &AppContext, volume_id: Option<&str>) -> Result<Vec<Volume>, String> {
    match volume_id {
        Some(id) => {
            let volume = rom_steward_db::get_volume(&ctx.conn, id)
                .map_err(|e| format!("Volume query failed: {e}"))?
                .ok_or_else(|| format!("No volume with id {id}"))?;
            Ok(vec![volume])
        }
        None => rom_steward_db::list_volumes(&ctx.conn)
            .map_err(|e| format!("Volume query failed: {e}")),
    }
}

/// Hash stored files that have no fingerprint yet. Returns the number of
/// files that failed to hash.
fn hash_missing(ctx: &AppContext, volume: &Volume) -> u64 {
    let files = match rom_steward_db::rom_files_for_volume(&ctx.conn, &volume.id) {
        Ok(f) => f,
        Err(e) => {
            log::warn!("Cannot list files for '{}': {e}", volume.label);
            return 0;
        }
    };

    let root = Path::new(&volume.root_path);
    let pending: Vec<(String, PathBuf)> = files
        .iter()
        .filter(|f| f.fingerprint.is_none() && !f.is_archived)
        .map(|f| (f.id.clone(), root.join(&f.relative_path)))
        .filter(|(_, path)| path.is_file())
        .collect();
    if pending.is_empty() {
        return 0;
    }

    log::info!(
        "Hashing {} files on '{}' before verification",
        pending.len(),
        volume.label
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Cannot start hashing runtime: {e}");
            return pending.len() as u64;
        }
    };

    runtime.block_on(async {
        // The pool publishes into a scratch cache here; the session cache
        // is updated when the results land in the database.
        let pool = HashJobPool::start(
            HashPoolConfig { max_concurrency: 2 },
            Arc::new(HashCache::in_memory()),
        );

        // Queue individually so each job carries its header skip
        let mut job_ids: Vec<Option<String>> = Vec::with_capacity(pending.len());
        for (_, path) in &pending {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            let skip = rom_steward_lib::header::skip_for_file(path, size) as u32;
            match pool.enqueue(path, HashPriority::High, skip) {
                Ok(id) => job_ids.push(Some(id)),
                Err(e) => {
                    log::warn!("Could not queue {}: {e}", path.display());
                    job_ids.push(None);
                }
            }
        }

        // Wait for the queue to drain
        loop {
            let done = job_ids
                .iter()
                .flatten()
                .all(|id| pool.status(id).map(|j| j.state.is_terminal()).unwrap_or(true));
            if done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let mut failures = 0u64;
        for ((file_id, path), job_id) in pending.iter().zip(&job_ids) {
            let job = job_id.as_deref().and_then(|id| pool.status(id));
            match job {
                Some(job) if job.state == HashJobState::Completed => {
                    if let Some(fingerprint) = job.result.clone() {
                        if let Err(e) =
                            record_fingerprint(ctx, file_id, path, fingerprint)
                        {
                            log::warn!("Could not store hash for {}: {e}", path.display());
                            failures += 1;
                        }
                    }
                }
                Some(job) => {
                    log::warn!(
                        "Hashing failed for {}: {}",
                        path.display(),
                        job.error.as_deref().unwrap_or("unknown error")
                    );
                    failures += 1;
                }
                None => failures += 1,
            }
        }

        pool.shutdown();
        failures
    })
}

fn record_fingerprint(
    ctx: &AppContext,
    file_id: &str,
    path: &Path,
    fingerprint: rom_steward_core::Fingerprint,
) -> Result<(), rom_steward_db::OperationError> {
    let mut file = rom_steward_db::get_rom_file(&ctx.conn, file_id)?
        .ok_or_else(|| rom_steward_db::OperationError::not_found("rom_file", file_id))?;
    file.fingerprint = Some(fingerprint.clone());
    file.hashed_at = Some(chrono::Utc::now());
    rom_steward_db::upsert_rom_file(&ctx.conn, &file)?;

    if let Some((mtime, size)) = rom_steward_lib::cache::stat_key(path) {
        ctx.cache.publish(path, fingerprint, mtime, size);
    }
    Ok(())
}
