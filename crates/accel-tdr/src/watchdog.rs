//! Watchdog scheduler.
//!
//! A running watchdog owns two threads:
//!
//! - the **timer** thread wakes once per interval, queues a scan request and
//!   immediately re-arms for `now + interval`, so a slow scan never delays
//!   the cadence;
//! - the **scan worker** thread receives requests and runs one
//!   [`LivenessEvaluator::run_cycle`] per request.
//!
//! The request queue holds at most one pending scan. A tick that finds a scan
//! already queued is coalesced into it and counted in
//! [`TdrStatsSnapshot::skipped_dispatches`](crate::stats::TdrStatsSnapshot).
//!
//! [`Watchdog::stop`] cancels the timer, discards any scan that has not begun
//! and joins the worker, so no scan runs after it returns. Start and stop
//! hold the lifecycle lock for their whole duration; a second `stop` racing
//! the first returns only once the threads are joined.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{TdrError, TdrResult};
use crate::evaluator::LivenessEvaluator;

/// Why a watchdog did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledReason {
    /// The device has no recovery procedure.
    NoRecovery,
    /// The scan interval is zero.
    ZeroInterval,
}

/// Result of [`Watchdog::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// The watchdog is now running.
    Started,
    /// The watchdog was already running; nothing changed.
    AlreadyStarted,
    /// The watchdog stays off. This is a valid configuration, not a failure.
    Disabled(DisabledReason),
}

/// Handles of a running watchdog.
struct Running {
    stop_tx: Sender<()>,
    cancelled: Arc<AtomicBool>,
    timer: JoinHandle<()>,
    worker: JoinHandle<()>,
}

/// Periodic liveness scanner for one device.
pub struct Watchdog {
    interval: Duration,
    evaluator: Option<Arc<LivenessEvaluator>>,
    running: Mutex<Option<Running>>,
    // Cleared only after the threads are joined.
    started: AtomicBool,
}

impl Watchdog {
    /// Create a stopped watchdog.
    ///
    /// `evaluator` is `None` when the device cannot recover; such a watchdog
    /// never starts.
    #[must_use]
    pub fn new(interval: Duration, evaluator: Option<Arc<LivenessEvaluator>>) -> Self {
        Self {
            interval,
            evaluator,
            running: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Scan interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `true` from a successful [`Watchdog::start`] until [`Watchdog::stop`]
    /// has joined both watchdog threads.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// The evaluator driven by this watchdog, if recovery is supported.
    #[must_use]
    pub fn evaluator(&self) -> Option<&Arc<LivenessEvaluator>> {
        self.evaluator.as_ref()
    }

    /// Arm the watchdog.
    ///
    /// A missing recovery procedure or a zero interval leaves the watchdog
    /// off and is reported as [`StartOutcome::Disabled`].
    ///
    /// # Errors
    ///
    /// Returns an error if a watchdog thread cannot be spawned.
    pub fn start(&self) -> TdrResult<StartOutcome> {
        let Some(evaluator) = &self.evaluator else {
            tracing::debug!("Recovery not supported, watchdog NOT started");
            return Ok(StartOutcome::Disabled(DisabledReason::NoRecovery));
        };
        if self.interval.is_zero() {
            tracing::debug!("Scan interval is zero, watchdog NOT started");
            return Ok(StartOutcome::Disabled(DisabledReason::ZeroInterval));
        }

        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(StartOutcome::AlreadyStarted);
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let (scan_tx, scan_rx) = channel::bounded::<()>(1);
        let cancelled = Arc::new(AtomicBool::new(false));

        let worker = {
            let evaluator = Arc::clone(evaluator);
            let cancelled = Arc::clone(&cancelled);
            thread::Builder::new()
                .name("tdr-scan".into())
                .spawn(move || scan_worker(&evaluator, &scan_rx, &cancelled))
                .map_err(|e| TdrError::thread_spawn(&e))?
        };

        let timer = {
            let evaluator = Arc::clone(evaluator);
            let interval = self.interval;
            thread::Builder::new()
                .name("tdr-timer".into())
                .spawn(move || timer_loop(interval, &stop_rx, &scan_tx, &evaluator))
        };
        let timer = match timer {
            Ok(timer) => timer,
            Err(e) => {
                // The worker exits once its request sender is gone.
                join_thread(worker, "scan worker");
                return Err(TdrError::thread_spawn(&e));
            }
        };

        *running = Some(Running {
            stop_tx,
            cancelled,
            timer,
            worker,
        });
        self.started.store(true, Ordering::Release);

        tracing::debug!(
            interval_secs = self.interval.as_secs_f64(),
            "Check activities in every interval"
        );
        Ok(StartOutcome::Started)
    }

    /// Disarm the watchdog and wait for any in-flight scan to finish.
    ///
    /// Does nothing if the watchdog is not running. After this returns no
    /// scan is running or scheduled, including when another thread's `stop`
    /// is still joining. Neither `start` nor `stop` may be called from inside
    /// a recovery handler, which runs on the scan worker being joined.
    pub fn stop(&self) {
        let mut guard = self.running.lock();
        let Some(running) = guard.take() else {
            return;
        };

        running.cancelled.store(true, Ordering::Release);
        drop(running.stop_tx);
        join_thread(running.timer, "timer");
        join_thread(running.worker, "scan worker");
        self.started.store(false, Ordering::Release);
        drop(guard);

        tracing::debug!("Timer stopped");
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("interval", &self.interval)
            .field("recovery_supported", &self.evaluator.is_some())
            .field("started", &self.is_started())
            .finish()
    }
}

fn timer_loop(
    interval: Duration,
    stop_rx: &Receiver<()>,
    scan_tx: &Sender<()>,
    evaluator: &LivenessEvaluator,
) {
    let mut deadline = Instant::now() + interval;
    loop {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match stop_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }

        match scan_tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                evaluator.stats().inc_skipped_dispatch();
                tracing::trace!("Scan already queued, tick coalesced");
            }
            Err(TrySendError::Disconnected(())) => return,
        }
        deadline = Instant::now() + interval;
    }
}

fn scan_worker(evaluator: &LivenessEvaluator, scan_rx: &Receiver<()>, cancelled: &AtomicBool) {
    while scan_rx.recv().is_ok() {
        if cancelled.load(Ordering::Acquire) {
            break;
        }
        let outcome = evaluator.run_cycle();
        tracing::trace!(?outcome, "Scan cycle finished");
    }
}

fn join_thread(handle: JoinHandle<()>, role: &str) {
    if handle.join().is_err() {
        tracing::error!(role, "Watchdog thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RecoveryPolicy;
    use crate::recovery::RecoveryRequest;
    use crate::registry::ClientRegistry;
    use crate::stats::TdrStats;

    fn evaluator() -> Arc<LivenessEvaluator> {
        Arc::new(LivenessEvaluator::new(
            "npu0",
            Arc::new(ClientRegistry::new()),
            Arc::new(|_: &RecoveryRequest| {}),
            Arc::new(TdrStats::new()),
            RecoveryPolicy::EveryCycle,
        ))
    }

    #[test]
    fn test_disabled_without_recovery() -> TdrResult<()> {
        let watchdog = Watchdog::new(Duration::from_secs(2), None);
        assert_eq!(
            watchdog.start()?,
            StartOutcome::Disabled(DisabledReason::NoRecovery)
        );
        assert!(!watchdog.is_started());
        Ok(())
    }

    #[test]
    fn test_disabled_with_zero_interval() -> TdrResult<()> {
        let watchdog = Watchdog::new(Duration::ZERO, Some(evaluator()));
        assert_eq!(
            watchdog.start()?,
            StartOutcome::Disabled(DisabledReason::ZeroInterval)
        );
        assert!(!watchdog.is_started());
        Ok(())
    }

    #[test]
    fn test_start_stop() -> TdrResult<()> {
        let watchdog = Watchdog::new(Duration::from_millis(10), Some(evaluator()));
        assert_eq!(watchdog.start()?, StartOutcome::Started);
        assert_eq!(watchdog.start()?, StartOutcome::AlreadyStarted);
        assert!(watchdog.is_started());

        watchdog.stop();
        assert!(!watchdog.is_started());
        watchdog.stop();
        Ok(())
    }

    #[test]
    fn test_scans_run_on_cadence() -> TdrResult<()> {
        let evaluator = evaluator();
        let watchdog = Watchdog::new(Duration::from_millis(10), Some(Arc::clone(&evaluator)));
        watchdog.start()?;
        thread::sleep(Duration::from_millis(100));
        watchdog.stop();

        let scans = evaluator.stats().scans();
        assert!(scans >= 2, "expected several scans, got {scans}");

        thread::sleep(Duration::from_millis(30));
        assert_eq!(evaluator.stats().scans(), scans);
        Ok(())
    }
}
