//! The `status` command.

use owo_colors::OwoColorize;

use crate::context::AppContext;
use crate::{EXIT_OK, EXIT_RUNTIME};

pub(crate) fn run(ctx: &AppContext) -> i32 {
    let summaries = match rom_steward_db::catalog_summaries(&ctx.conn) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Catalog query failed: {e}");
            return EXIT_RUNTIME;
        }
    };
    let counts = match rom_steward_db::verification_counts(&ctx.conn, None) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Verification query failed: {e}");
            return EXIT_RUNTIME;
        }
    };

    if summaries.is_empty() {
        log::info!("No catalogs imported; run `rom-steward import-dat <file>` first");
    } else {
        log::info!("{}", "Catalogs:".bold().to_string());
        for summary in &summaries {
            let enabled = if summary.catalog.is_enabled { "" } else { " (disabled)" };
            log::info!(
                "  {} [{}]: {} games, {} ROMs, {} matched files{}",
                summary.catalog.display_name,
                summary.catalog.provider.as_str(),
                summary.catalog.game_count,
                summary.catalog.rom_count,
                summary.matched_files,
                enabled
            );
        }
    }

    log::info!("{}", "Collection:".bold().to_string());
    log::info!(
        "  {} verified, {} bad dumps, {} not in catalog, {} unverified, {} unknown",
        counts.verified.to_string().green().to_string(),
        counts.bad_dump.to_string().red().to_string(),
        counts.not_in_catalog,
        counts.unverified,
        counts.unknown
    );

    EXIT_OK
}
