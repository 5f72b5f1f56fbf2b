//! Memory-pressure monitor.
//!
//! Samples process-resident memory against available system memory every
//! couple of seconds and exposes a coarse pressure level. Batch-hungry
//! consumers (the scanner, the bulk inserter) ask for a recommended batch
//! size before allocating. There is no global instance: construct one and
//! pass it where needed.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PressureLevel {
    Low,
    Normal,
    Elevated,
    High,
    Critical,
}

impl PressureLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PressureLevel::Low => "low",
            PressureLevel::Normal => "normal",
            PressureLevel::Elevated => "elevated",
            PressureLevel::High => "high",
            PressureLevel::Critical => "critical",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => PressureLevel::Low,
            1 => PressureLevel::Normal,
            2 => PressureLevel::Elevated,
            3 => PressureLevel::High,
            _ => PressureLevel::Critical,
        }
    }

    /// Classify a usage percentage.
    pub fn from_usage_pct(pct: f64) -> Self {
        if pct >= 95.0 {
            PressureLevel::Critical
        } else if pct >= 85.0 {
            PressureLevel::High
        } else if pct >= 70.0 {
            PressureLevel::Elevated
        } else if pct >= 50.0 {
            PressureLevel::Normal
        } else {
            PressureLevel::Low
        }
    }
}

struct Inner {
    level: AtomicU8,
    shutdown: AtomicBool,
    tx: watch::Sender<PressureLevel>,
}

pub struct MemoryMonitor {
    inner: Arc<Inner>,
    handle: Option<std::thread::JoinHandle<()>>,
}

/// Default sampling cadence.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

impl MemoryMonitor {
    /// Start a sampling monitor.
    pub fn start() -> Self {
        Self::start_with_interval(SAMPLE_INTERVAL)
    }

    pub fn start_with_interval(interval: Duration) -> Self {
        let (tx, _) = watch::channel(PressureLevel::Low);
        let inner = Arc::new(Inner {
            level: AtomicU8::new(PressureLevel::Low as u8),
            shutdown: AtomicBool::new(false),
            tx,
        });

        let thread_inner = inner.clone();
        let handle = std::thread::Builder::new()
            .name("memory-monitor".to_string())
            .spawn(move || sample_loop(thread_inner, interval))
            .ok();

        Self { inner, handle }
    }

    /// A monitor pinned to one level. Used in tests and to disable
    /// adaptation (`fixed(PressureLevel::Normal)`).
    pub fn fixed(level: PressureLevel) -> Self {
        let (tx, _) = watch::channel(level);
        let inner = Arc::new(Inner {
            level: AtomicU8::new(level as u8),
            shutdown: AtomicBool::new(true),
            tx,
        });
        Self {
            inner,
            handle: None,
        }
    }

    pub fn current_level(&self) -> PressureLevel {
        PressureLevel::from_u8(self.inner.level.load(Ordering::Relaxed))
    }

    /// Scale a default batch size down under pressure. Floors keep the
    /// pipeline moving even when critical.
    pub fn recommended_batch_size(&self, default: usize) -> usize {
        match self.current_level() {
            PressureLevel::Critical => (default / 10).max(50),
            PressureLevel::High => (default / 4).max(100),
            PressureLevel::Elevated => (default / 2).max(250),
            PressureLevel::Normal | PressureLevel::Low => default,
        }
    }

    /// Block until the level drops below High or the timeout expires.
    /// Returns true when relief arrived.
    pub fn wait_for_relief(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.current_level() < PressureLevel::High {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(100).min(timeout));
        }
    }

    /// Subscribe to level-change events.
    pub fn subscribe(&self) -> watch::Receiver<PressureLevel> {
        self.inner.tx.subscribe()
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn sample_loop(inner: Arc<Inner>, interval: Duration) {
    let mut system = System::new();
    let pid = Pid::from_u32(std::process::id());

    while !inner.shutdown.load(Ordering::Relaxed) {
        system.refresh_memory();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_memory(),
        );

        let resident = system
            .process(pid)
            .map(|p| p.memory())
            .unwrap_or(0);
        let available = system.available_memory();
        let total = resident + available;
        let pct = if total == 0 {
            0.0
        } else {
            resident as f64 / total as f64 * 100.0
        };

        let level = PressureLevel::from_usage_pct(pct);
        let previous = PressureLevel::from_u8(
            inner.level.swap(level as u8, Ordering::Relaxed),
        );
        if level != previous {
            log::debug!(
                "Memory pressure {} -> {} ({pct:.1}%)",
                previous.as_str(),
                level.as_str()
            );
            let _ = inner.tx.send(level);
        }

        // Sleep in short slices so shutdown is prompt
        let deadline = Instant::now() + interval;
        while Instant::now() < deadline && !inner.shutdown.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_thresholds() {
        assert_eq!(PressureLevel::from_usage_pct(10.0), PressureLevel::Low);
        assert_eq!(PressureLevel::from_usage_pct(50.0), PressureLevel::Normal);
        assert_eq!(PressureLevel::from_usage_pct(70.0), PressureLevel::Elevated);
        assert_eq!(PressureLevel::from_usage_pct(85.0), PressureLevel::High);
        assert_eq!(PressureLevel::from_usage_pct(95.0), PressureLevel::Critical);
        assert_eq!(PressureLevel::from_usage_pct(99.9), PressureLevel::Critical);
    }

    #[test]
    fn test_batch_recommendations() {
        let m = MemoryMonitor::fixed(PressureLevel::Critical);
        assert_eq!(m.recommended_batch_size(1000), 100);
        assert_eq!(m.recommended_batch_size(100), 50);

        let m = MemoryMonitor::fixed(PressureLevel::High);
        assert_eq!(m.recommended_batch_size(1000), 250);

        let m = MemoryMonitor::fixed(PressureLevel::Elevated);
        assert_eq!(m.recommended_batch_size(1000), 500);

        let m = MemoryMonitor::fixed(PressureLevel::Normal);
        assert_eq!(m.recommended_batch_size(1000), 1000);

        let m = MemoryMonitor::fixed(PressureLevel::Low);
        assert_eq!(m.recommended_batch_size(1000), 1000);
    }

    #[test]
    fn test_wait_for_relief_timeout() {
        let m = MemoryMonitor::fixed(PressureLevel::Critical);
        let start = Instant::now();
        assert!(!m.wait_for_relief(Duration::from_millis(150)));
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_wait_for_relief_immediate() {
        let m = MemoryMonitor::fixed(PressureLevel::Normal);
        assert!(m.wait_for_relief(Duration::from_secs(1)));
    }
}
