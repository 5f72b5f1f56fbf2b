//! Plan execution.
//!
//! Operations run in plan order, sequentially. The journal is persisted
//! before the first operation and after every recorded entry, so
//! interrupting execution at any point leaves a journal that rollback
//! can replay. Individual moves are atomic on the same device (rename);
//! cross-device moves fall back to copy-then-delete. The executor never
//! overwrites an existing file — a collision fails that one operation
//! and execution continues.

use std::path::Path;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use rom_steward_core::{OrganizationOperation, RollbackEntry};

use crate::error::OrganizeError;
use crate::journal::OperationJournal;
use crate::plan::{OperationType, OrganizationPlan};

#[derive(Debug, Clone)]
pub struct FileOperationError {
    pub source_path: String,
    pub destination_path: String,
    pub message: String,
}

#[derive(Debug)]
pub struct OrganizationResult {
    pub operation_id: String,
    /// True only when no operation failed.
    pub success: bool,
    pub files_processed: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub bytes_processed: u64,
    pub duration: std::time::Duration,
    pub can_rollback: bool,
    pub cancelled: bool,
    pub errors: Vec<FileOperationError>,
}

/// Execute a plan. The journal gains an operation row before any file is
/// touched; each completed move or copy appends an entry and re-persists
/// the journal.
pub fn execute_plan(
    plan: &OrganizationPlan,
    journal: &dyn OperationJournal,
    cancel: &CancellationToken,
) -> Result<OrganizationResult, OrganizeError> {
    let started = Instant::now();

    let mut op = OrganizationOperation {
        id: uuid::Uuid::new_v4().to_string(),
        performed_at: chrono::Utc::now(),
        source_root: plan.source_root.to_string_lossy().to_string(),
        destination_root: plan.destination_root.to_string_lossy().to_string(),
        template_name: plan.template_name.clone(),
        was_move: plan.move_files,
        file_count: plan.file_count,
        total_bytes: plan.total_bytes,
        can_rollback: false,
        rollback_entries: Vec::new(),
        is_rolled_back: false,
        rolled_back_at: None,
    };
    journal.insert(&op)?;

    let mut result = OrganizationResult {
        operation_id: op.id.clone(),
        success: false,
        files_processed: 0,
        files_skipped: 0,
        files_failed: 0,
        bytes_processed: 0,
        duration: std::time::Duration::ZERO,
        can_rollback: false,
        cancelled: false,
        errors: Vec::new(),
    };

    for file_op in &plan.operations {
        // An in-flight move is never interrupted; the next one is not
        // attempted after a cancel.
        if cancel.is_cancelled() {
            result.cancelled = true;
            break;
        }

        match file_op.op_type {
            OperationType::Skip | OperationType::Extract => {
                result.files_skipped += 1;
                continue;
            }
            OperationType::Move | OperationType::Copy => {}
        }

        let source = &file_op.source_path;
        let destination = &file_op.destination_path;

        if destination.exists() {
            result.files_failed += 1;
            result.errors.push(FileOperationError {
                source_path: source.to_string_lossy().to_string(),
                destination_path: destination.to_string_lossy().to_string(),
                message: "Destination already exists".to_string(),
            });
            continue;
        }

        let moved = file_op.op_type == OperationType::Move;
        match transfer(source, destination, moved) {
            Ok(()) => {
                result.files_processed += 1;
                result.bytes_processed += file_op.size;
                op.rollback_entries.push(RollbackEntry {
                    current_path: destination.to_string_lossy().to_string(),
                    original_path: source.to_string_lossy().to_string(),
                    was_moved: moved,
                });
                op.can_rollback = plan.move_files
                    && op.rollback_entries.iter().any(|e| e.was_moved);
                journal.update(&op)?;
            }
            Err(e) => {
                result.files_failed += 1;
                result.errors.push(FileOperationError {
                    source_path: source.to_string_lossy().to_string(),
                    destination_path: destination.to_string_lossy().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    if plan.move_files && plan.delete_empty_folders && !result.cancelled {
        remove_empty_dirs_below(&plan.source_root);
    }

    result.success = result.files_failed == 0 && !result.cancelled;
    result.can_rollback = op.can_rollback;
    result.duration = started.elapsed();
    journal.update(&op)?;

    Ok(result)
}

/// Move or copy one file. Moves try a same-device rename first and fall
/// back to copy-then-delete across devices. The destination directory is
/// created as needed.
fn transfer(source: &Path, destination: &Path, moved: bool) -> std::io::Result<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !moved {
        std::fs::copy(source, destination)?;
        return Ok(());
    }

    match std::fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            std::fs::copy(source, destination)?;
            std::fs::remove_file(source)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Delete empty directories beneath a root, deepest first. The root
/// itself stays.
pub(crate) fn remove_empty_dirs_below(root: &Path) {
    let mut dirs = Vec::new();
    collect_dirs(root, &mut dirs);
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    for dir in dirs {
        // remove_dir refuses non-empty directories, which is exactly
        // the behavior wanted here
        let _ = std::fs::remove_dir(&dir);
    }
}

fn collect_dirs(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            out.push(path.clone());
            collect_dirs(&path, out);
        }
    }
}

#[cfg(test)]
#[path = "tests/execute_tests.rs"]
mod tests;
