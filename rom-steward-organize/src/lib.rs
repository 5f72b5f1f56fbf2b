//! The organization engine: plan, execute, rollback.
//!
//! Planning is pure — it renders templates and detects collisions
//! without touching the filesystem beyond reads. Execution persists a
//! rollback journal before the first file is moved and after every
//! entry, so a crash at any point leaves the collection recoverable.
//! Rollback replays the journal in reverse, best-effort.

pub mod error;
pub mod execute;
pub mod journal;
pub mod plan;
pub mod rollback;
pub mod template;

pub use error::OrganizeError;
pub use execute::{execute_plan, FileOperationError, OrganizationResult};
pub use journal::{MemoryJournal, OperationJournal};
pub use plan::{
    build_plan, FileOperation, OperationType, OrganizationPlan, OrganizeRequest,
};
pub use rollback::{rollback_operation, RollbackResult};
pub use template::{OrganizeTemplate, Template, TemplateContext};
