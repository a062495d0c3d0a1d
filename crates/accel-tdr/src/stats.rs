//! Watchdog diagnostic counters.
//!
//! All counters are `AtomicU64` with `Ordering::Relaxed`. They are
//! observability data: nothing synchronises on them and readers only need
//! eventually consistent values.

use core::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};

/// Snapshot returned by [`TdrStats::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TdrStatsSnapshot {
    /// Recoveries triggered.
    pub recoveries: u64,
    /// Scan cycles completed.
    pub scans: u64,
    /// Cycles that found no outstanding work.
    pub idle_scans: u64,
    /// Cycles that found at least one context making progress.
    pub healthy_scans: u64,
    /// Stuck verdicts that the recovery policy suppressed.
    pub suppressed_recoveries: u64,
    /// Timer ticks dropped because a scan was already queued.
    pub skipped_dispatches: u64,
}

/// Live watchdog counters.
#[derive(Debug, Default)]
pub struct TdrStats {
    recoveries: AtomicU64,
    scans: AtomicU64,
    idle_scans: AtomicU64,
    healthy_scans: AtomicU64,
    suppressed_recoveries: AtomicU64,
    skipped_dispatches: AtomicU64,
}

impl TdrStats {
    /// Create zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            recoveries: AtomicU64::new(0),
            scans: AtomicU64::new(0),
            idle_scans: AtomicU64::new(0),
            healthy_scans: AtomicU64::new(0),
            suppressed_recoveries: AtomicU64::new(0),
            skipped_dispatches: AtomicU64::new(0),
        }
    }

    /// Count a triggered recovery and return the new total.
    #[inline]
    pub fn inc_recovery(&self) -> u64 {
        self.recoveries.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Count a completed scan cycle.
    #[inline]
    pub fn inc_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a cycle with no outstanding work.
    #[inline]
    pub fn inc_idle_scan(&self) {
        self.idle_scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a cycle that observed progress.
    #[inline]
    pub fn inc_healthy_scan(&self) {
        self.healthy_scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a stuck verdict suppressed by policy.
    #[inline]
    pub fn inc_suppressed_recovery(&self) {
        self.suppressed_recoveries.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a timer tick that found a scan already queued.
    #[inline]
    pub fn inc_skipped_dispatch(&self) {
        self.skipped_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Total recoveries triggered.
    #[must_use]
    pub fn recoveries(&self) -> u64 {
        self.recoveries.load(Ordering::Relaxed)
    }

    /// Total scan cycles completed.
    #[must_use]
    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> TdrStatsSnapshot {
        TdrStatsSnapshot {
            recoveries: self.recoveries.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
            idle_scans: self.idle_scans.load(Ordering::Relaxed),
            healthy_scans: self.healthy_scans.load(Ordering::Relaxed),
            suppressed_recoveries: self.suppressed_recoveries.load(Ordering::Relaxed),
            skipped_dispatches: self.skipped_dispatches.load(Ordering::Relaxed),
        }
    }
}
