//! The operation journal contract.
//!
//! The executor writes through this trait so the engine stays agnostic
//! of the store; the SQLite implementation lives on the database
//! connection, and [`MemoryJournal`] backs tests.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use rom_steward_core::OrganizationOperation;

use crate::error::OrganizeError;

pub trait OperationJournal {
    /// Persist a brand-new operation (called before the first file op).
    fn insert(&self, op: &OrganizationOperation) -> Result<(), OrganizeError>;

    /// Persist the current journal entries and counts (called after
    /// every recorded entry and once at the end).
    fn update(&self, op: &OrganizationOperation) -> Result<(), OrganizeError>;

    fn load(&self, operation_id: &str) -> Result<Option<OrganizationOperation>, OrganizeError>;

    fn mark_rolled_back(
        &self,
        operation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), OrganizeError>;
}

impl OperationJournal for rom_steward_db::Connection {
    fn insert(&self, op: &OrganizationOperation) -> Result<(), OrganizeError> {
        rom_steward_db::insert_operation(self, op)
            .map_err(|e| OrganizeError::journal(e.to_string()))
    }

    fn update(&self, op: &OrganizationOperation) -> Result<(), OrganizeError> {
        rom_steward_db::update_operation_journal(
            self,
            &op.id,
            &op.rollback_entries,
            op.file_count,
            op.total_bytes,
            op.can_rollback,
        )
        .map_err(|e| OrganizeError::journal(e.to_string()))
    }

    fn load(&self, operation_id: &str) -> Result<Option<OrganizationOperation>, OrganizeError> {
        rom_steward_db::get_operation(self, operation_id)
            .map_err(|e| OrganizeError::journal(e.to_string()))
    }

    fn mark_rolled_back(
        &self,
        operation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), OrganizeError> {
        rom_steward_db::mark_operation_rolled_back(self, operation_id, at)
            .map_err(|e| OrganizeError::journal(e.to_string()))
    }
}

/// In-memory journal for tests and dry runs.
#[derive(Default)]
pub struct MemoryJournal {
    ops: Mutex<Vec<OrganizationOperation>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> Vec<OrganizationOperation> {
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl OperationJournal for MemoryJournal {
    fn insert(&self, op: &OrganizationOperation) -> Result<(), OrganizeError> {
        self.ops
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(op.clone());
        Ok(())
    }

    fn update(&self, op: &OrganizationOperation) -> Result<(), OrganizeError> {
        let mut ops = self.ops.lock().unwrap_or_else(|e| e.into_inner());
        match ops.iter_mut().find(|o| o.id == op.id) {
            Some(existing) => {
                *existing = op.clone();
                Ok(())
            }
            None => Err(OrganizeError::journal(format!(
                "Unknown operation {}",
                op.id
            ))),
        }
    }

    fn load(&self, operation_id: &str) -> Result<Option<OrganizationOperation>, OrganizeError> {
        Ok(self
            .ops
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|o| o.id == operation_id)
            .cloned())
    }

    fn mark_rolled_back(
        &self,
        operation_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), OrganizeError> {
        let mut ops = self.ops.lock().unwrap_or_else(|e| e.into_inner());
        match ops.iter_mut().find(|o| o.id == operation_id) {
            Some(op) => {
                op.is_rolled_back = true;
                op.can_rollback = false;
                op.rolled_back_at = Some(at);
                Ok(())
            }
            None => Err(OrganizeError::journal(format!(
                "Unknown operation {operation_id}"
            ))),
        }
    }
}
