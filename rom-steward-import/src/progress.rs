//! Import progress reporting.

/// Trait for receiving import progress updates.
pub trait ImportProgress {
    /// Called as games are parsed or inserted; `current` is a running count.
    fn on_progress(&self, current: usize, label: &str);

    /// Called when a phase starts (e.g. "Parsing", "Inserting games").
    fn on_phase(&self, message: &str);

    /// Called when the import is complete.
    fn on_complete(&self, message: &str);
}

/// A no-op progress reporter that discards all updates.
pub struct SilentProgress;

impl ImportProgress for SilentProgress {
    fn on_progress(&self, _current: usize, _label: &str) {}
    fn on_phase(&self, _message: &str) {}
    fn on_complete(&self, _message: &str) {}
}

/// A progress reporter that logs to the `log` crate.
pub struct LogProgress;

impl ImportProgress for LogProgress {
    fn on_progress(&self, current: usize, label: &str) {
        if current.is_multiple_of(5000) {
            log::info!("  [{current}] {label}");
        }
    }

    fn on_phase(&self, message: &str) {
        log::info!("{message}");
    }

    fn on_complete(&self, message: &str) {
        log::info!("{message}");
    }
}
