//! Rollback of a completed organization run.
//!
//! Replays the persisted journal: every moved file still at its
//! destination goes back to its original location, never overwriting.
//! Failures are recorded per entry and the remaining entries are still
//! attempted; the operation is marked rolled back either way so it
//! cannot be replayed twice.

use std::path::Path;

use crate::error::OrganizeError;
use crate::execute::remove_empty_dirs_below;
use crate::journal::OperationJournal;

#[derive(Debug)]
pub struct RollbackResult {
    pub operation_id: String,
    pub entries_total: u64,
    pub entries_restored: u64,
    pub entries_failed: u64,
    /// True when every moved entry was restored.
    pub success: bool,
    pub errors: Vec<String>,
}

pub fn rollback_operation(
    journal: &dyn OperationJournal,
    operation_id: &str,
) -> Result<RollbackResult, OrganizeError> {
    let op = journal
        .load(operation_id)?
        .ok_or_else(|| OrganizeError::OperationNotFound(operation_id.to_string()))?;

    if op.is_rolled_back || !op.can_rollback {
        return Err(OrganizeError::NotRollbackable(operation_id.to_string()));
    }

    let mut result = RollbackResult {
        operation_id: operation_id.to_string(),
        entries_total: 0,
        entries_restored: 0,
        entries_failed: 0,
        success: false,
        errors: Vec::new(),
    };

    for entry in &op.rollback_entries {
        if !entry.was_moved {
            continue;
        }
        result.entries_total += 1;

        let current = Path::new(&entry.current_path);
        let original = Path::new(&entry.original_path);

        if !current.exists() {
            result.entries_failed += 1;
            result
                .errors
                .push(format!("Missing at destination: {}", entry.current_path));
            continue;
        }
        if original.exists() {
            result.entries_failed += 1;
            result
                .errors
                .push(format!("Original path occupied: {}", entry.original_path));
            continue;
        }

        let restore = (|| -> std::io::Result<()> {
            if let Some(parent) = original.parent() {
                std::fs::create_dir_all(parent)?;
            }
            match std::fs::rename(current, original) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
                    std::fs::copy(current, original)?;
                    std::fs::remove_file(current)?;
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })();

        match restore {
            Ok(()) => result.entries_restored += 1,
            Err(e) => {
                result.entries_failed += 1;
                result
                    .errors
                    .push(format!("Failed to restore {}: {e}", entry.original_path));
            }
        }
    }

    journal.mark_rolled_back(operation_id, chrono::Utc::now())?;
    remove_empty_dirs_below(Path::new(&op.destination_root));

    result.success = result.entries_failed == 0;
    Ok(result)
}

#[cfg(test)]
#[path = "tests/rollback_tests.rs"]
mod tests;
