//! Per-context activity records.
//!
//! A [`HwContext`] carries the counters shared between the submission path,
//! the completion path and the watchdog. Each counter is an independent
//! `AtomicU64`; no lock ties them together.
//!
//! # Hot path
//!
//! [`HwContext::record_submission`], [`HwContext::record_completion`] and
//! [`HwContext::record_error`] are a single atomic fetch-add each. They never
//! block and never allocate.

use core::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a hardware context, unique within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(u32);

impl ContextId {
    /// Wrap a raw context id.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Identifier of a client, unique within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(u32);

impl ClientId {
    /// Wrap a raw client id.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// A best-effort reading of a context's submitted and completed counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Activity {
    /// Jobs enqueued to the device.
    pub submitted: u64,
    /// Jobs the device reported finished.
    pub completed: u64,
}

impl Activity {
    /// `true` when the context has no outstanding work.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.submitted == self.completed
    }

    /// Number of jobs submitted but not yet completed.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.submitted.saturating_sub(self.completed)
    }
}

/// Query record describing one hardware context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInfo {
    /// Context id.
    pub context_id: ContextId,
    /// Owning client.
    pub client_id: ClientId,
    /// Process id of the owning client.
    pub pid: i64,
    /// Context name.
    pub name: String,
    /// Commands submitted to this context.
    pub command_submissions: u64,
    /// Commands completed by this context.
    pub command_completions: u64,
    /// Commands that ended in error, including those retired by recovery.
    pub errors: u64,
}

/// Activity record for one hardware execution context.
#[derive(Debug)]
pub struct HwContext {
    id: ContextId,
    client_id: ClientId,
    pid: i64,
    name: String,
    submitted: AtomicU64,
    completed: AtomicU64,
    errors: AtomicU64,
    // Only written by the liveness evaluator.
    last_observed_completed: AtomicU64,
}

impl HwContext {
    /// Create a context with all counters at zero.
    #[must_use]
    pub fn new(id: ContextId, client_id: ClientId, pid: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            client_id,
            pid,
            name: name.into(),
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_observed_completed: AtomicU64::new(0),
        }
    }

    /// Context id.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Owning client id.
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Context name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record that one job was enqueued to the device.
    #[inline]
    pub fn record_submission(&self) {
        self.submitted.fetch_add(1, Ordering::Release);
    }

    /// Record that the device finished one job.
    ///
    /// Callers must never complete more jobs than were submitted.
    #[inline]
    pub fn record_completion(&self) {
        self.completed.fetch_add(1, Ordering::Release);
    }

    /// Complete one outstanding job, if there is one.
    ///
    /// Unlike [`HwContext::record_completion`] this never lets `completed`
    /// overtake `submitted`, which makes it safe to race with
    /// [`HwContext::retire_outstanding`].
    pub fn complete_outstanding(&self) -> bool {
        self.completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |completed| {
                (completed < self.submitted.load(Ordering::Acquire)).then(|| completed + 1)
            })
            .is_ok()
    }

    /// Record that a job finished with an error.
    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the submitted and completed counters.
    ///
    /// The two loads are independent. `completed` is loaded first so that a
    /// racing submission can only make the context look busier, never make
    /// `completed` appear ahead of `submitted`.
    #[must_use]
    pub fn activity(&self) -> Activity {
        let completed = self.completed.load(Ordering::Acquire);
        let submitted = self.submitted.load(Ordering::Acquire);
        Activity {
            submitted,
            completed,
        }
    }

    /// Completed count seen by the previous scan that checked this context.
    #[must_use]
    pub fn last_observed_completed(&self) -> u64 {
        self.last_observed_completed.load(Ordering::Acquire)
    }

    /// Advance the watchdog's snapshot. Never moves backwards.
    pub(crate) fn observe_completed(&self, completed: u64) {
        self.last_observed_completed.fetch_max(completed, Ordering::AcqRel);
    }

    /// Mark every outstanding job as finished and count them as errors.
    ///
    /// Intended for device recovery procedures that abort in-flight work.
    /// Returns the number of jobs retired.
    pub fn retire_outstanding(&self) -> u64 {
        let submitted = self.submitted.load(Ordering::Acquire);
        let previous = self.completed.fetch_max(submitted, Ordering::AcqRel);
        let retired = submitted.saturating_sub(previous);
        if retired > 0 {
            self.errors.fetch_add(retired, Ordering::Relaxed);
        }
        retired
    }

    /// Query record for this context.
    #[must_use]
    pub fn info(&self) -> ContextInfo {
        let activity = self.activity();
        ContextInfo {
            context_id: self.id,
            client_id: self.client_id,
            pid: self.pid,
            name: self.name.clone(),
            command_submissions: activity.submitted,
            command_completions: activity.completed,
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
