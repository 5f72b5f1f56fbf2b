//! The `rollback` command.

use owo_colors::OwoColorize;

use rom_steward_organize::rollback_operation;

use crate::context::AppContext;
use crate::{EXIT_OK, EXIT_PARTIAL, EXIT_RUNTIME};

pub(crate) fn run(ctx: &AppContext, operation_id: &str) -> i32 {
    match rollback_operation(&ctx.conn, operation_id) {
        Ok(result) => {
            log::info!(
                "{} {}/{} files restored",
                "Rollback:".bold().to_string(),
                result.entries_restored,
                result.entries_total
            );
            for error in &result.errors {
                log::warn!("  {error}");
            }
            if result.success {
                EXIT_OK
            } else if result.entries_restored > 0 {
                EXIT_PARTIAL
            } else {
                EXIT_RUNTIME
            }
        }
        Err(e) => {
            log::error!("Rollback failed: {e}");
            EXIT_RUNTIME
        }
    }
}
