//! The `duplicates` command.

use owo_colors::OwoColorize;

use crate::context::AppContext;
use crate::{EXIT_OK, EXIT_RUNTIME};

pub(crate) fn run(ctx: &AppContext) -> i32 {
    let groups = match rom_steward_db::duplicate_groups(&ctx.conn) {
        Ok(g) => g,
        Err(e) => {
            log::error!("Duplicate query failed: {e}");
            return EXIT_RUNTIME;
        }
    };

    if groups.is_empty() {
        log::info!("No duplicates found");
        return EXIT_OK;
    }

    let total_wasted: u64 = groups.iter().map(|g| g.wasted_bytes).sum();
    log::info!(
        "{} duplicate groups, {} reclaimable",
        groups.len(),
        super::format_bytes(total_wasted).bold().to_string()
    );

    for group in &groups {
        log::info!(
            "  {} copies, {} wasted  [{}]",
            group.count,
            super::format_bytes(group.wasted_bytes),
            group.fingerprint
        );
        for file_id in &group.file_ids {
            if let Ok(Some(file)) = rom_steward_db::get_rom_file(&ctx.conn, file_id) {
                let suffix = file
                    .path_in_archive
                    .as_deref()
                    .map(|p| format!(" :: {p}"))
                    .unwrap_or_default();
                log::info!("      {}{suffix}", file.relative_path);
            }
        }
    }

    EXIT_OK
}
