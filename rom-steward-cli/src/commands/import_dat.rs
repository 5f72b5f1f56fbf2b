//! The `import-dat` command.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use rom_steward_import::{import_dat_file, ImportProgress};

use crate::context::AppContext;
use crate::{EXIT_OK, EXIT_PARTIAL, EXIT_RUNTIME};

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self { bar }
    }
}

impl ImportProgress for BarProgress {
    fn on_progress(&self, current: usize, label: &str) {
        self.bar.set_message(format!("{current} {label}"));
        self.bar.tick();
    }

    fn on_phase(&self, message: &str) {
        self.bar.set_message(message.to_string());
        self.bar.tick();
    }

    fn on_complete(&self, message: &str) {
        self.bar.finish_and_clear();
        log::info!("{message}");
    }
}

pub(crate) fn run(ctx: &AppContext, file: &Path, category: Option<&str>, quiet: bool) -> i32 {
    let bar_progress;
    let silent_progress;
    let progress: &dyn ImportProgress = if quiet {
        silent_progress = rom_steward_import::SilentProgress;
        &silent_progress
    } else {
        bar_progress = BarProgress::new();
        &bar_progress
    };

    match import_dat_file(&ctx.conn, file, category, Some(progress), Some(&ctx.memory)) {
        Ok(outcome) => {
            log::info!(
                "{} '{}' [{}]: {} games, {} ROM entries ({})",
                "Imported".bold().to_string(),
                outcome.catalog.display_name,
                outcome.catalog.provider.as_str(),
                outcome.stats.games_inserted,
                outcome.stats.roms_inserted,
                super::format_bytes(outcome.catalog.total_size)
            );
            if outcome.stats.errors > 0 {
                log::warn!("{} rows were skipped or failed", outcome.stats.errors);
                EXIT_PARTIAL
            } else {
                EXIT_OK
            }
        }
        Err(e) => {
            log::error!("Import failed: {e}");
            EXIT_RUNTIME
        }
    }
}
