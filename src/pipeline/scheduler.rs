//! Fixed-rate scheduling of the pipeline source.
//!
//! A single scheduler thread polls the source at a constant period. The
//! schedule is fixed-rate, not fixed-delay: if a tick fires late (for
//! example because a direct channel blocked the thread), the following
//! ticks fire immediately until the schedule catches up — ticks queue
//! rather than being skipped. Late ticks are counted in the stats.

use crate::channel::MessageHandler;
use crate::source::Source;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Configuration for the pipeline scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Period between source polls.
    pub period: std::time::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: std::time::Duration::from_secs(1),
        }
    }
}

impl SchedulerConfig {
    /// Create a config with a custom period.
    pub fn with_period(period: std::time::Duration) -> Self {
        Self { period }
    }
}

/// Snapshot of scheduler timing statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    /// Total number of ticks fired.
    pub ticks: u64,
    /// Ticks that fired behind schedule.
    pub late_ticks: u64,
    /// Messages produced by the source.
    pub produced: u64,
}

/// Atomic statistics for lock-free updates from the scheduler thread.
pub(crate) struct AtomicSchedulerStats {
    ticks: AtomicU64,
    late_ticks: AtomicU64,
    produced: AtomicU64,
}

impl AtomicSchedulerStats {
    pub(crate) fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            late_ticks: AtomicU64::new(0),
            produced: AtomicU64::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            late_ticks: self.late_ticks.load(Ordering::Relaxed),
            produced: self.produced.load(Ordering::Relaxed),
        }
    }
}

/// Drive the source at a fixed rate until it is exhausted, fails, or the
/// stop flag is raised.
pub(crate) fn run_schedule(
    mut source: Box<dyn Source>,
    entry: MessageHandler,
    period: std::time::Duration,
    stop: Arc<AtomicBool>,
    stats: Arc<AtomicSchedulerStats>,
) {
    tracing::debug!(source = source.name(), ?period, "schedule started");
    let mut next_tick = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        let wait = next_tick.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        if stop.load(Ordering::Relaxed) {
            break;
        }

        match source.produce() {
            Ok(Some(message)) => {
                stats.produced.fetch_add(1, Ordering::Relaxed);
                entry(message);
            }
            Ok(None) => {
                tracing::debug!(source = source.name(), "source exhausted");
                break;
            }
            Err(e) => {
                tracing::error!(source = source.name(), error = %e, "source failed");
                break;
            }
        }

        stats.ticks.fetch_add(1, Ordering::Relaxed);
        next_tick += period;
        if Instant::now() > next_tick {
            // Already past the next deadline: it will fire immediately.
            stats.late_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    tracing::debug!(source = source.name(), "schedule stopped");
}
