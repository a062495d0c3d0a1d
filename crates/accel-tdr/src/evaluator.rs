//! Liveness evaluation: one scan cycle.
//!
//! A cycle walks every client's contexts under the registry's structural
//! lock and classifies each one:
//!
//! - **idle**: `submitted == completed`, nothing outstanding;
//! - **progressing**: work is outstanding and `completed` moved since the
//!   previous scan that checked this context;
//! - **stalled**: work is outstanding and `completed` did not move.
//!
//! The walk stops at the first progressing context. One proof of life is
//! enough to call the device healthy for this interval, and it bounds the
//! cost of a scan. If every context was walked, at least one was busy and
//! none progressed, the device is stuck and the recovery handler runs after
//! the structural lock has been released.
//!
//! Concurrent [`LivenessEvaluator::run_cycle`] calls are serialised from scan
//! to decision, so each recovery policy step corresponds to exactly one scan.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::ContextId;
use crate::policy::{PolicyState, RecoveryPolicy};
use crate::recovery::{RecoveryHandler, RecoveryRequest};
use crate::registry::ClientRegistry;
use crate::stats::TdrStats;

/// Overall judgement of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No context has outstanding work.
    Idle,
    /// At least one context made progress.
    Healthy,
    /// Work is outstanding and no context made progress.
    Stuck,
}

/// Raw result of walking the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Contexts examined before the scan finished or stopped early.
    pub ctx_count: usize,
    /// Examined contexts with no outstanding work.
    pub idle_count: usize,
    /// The context whose progress ended the scan, if any.
    pub progressed: Option<ContextId>,
    /// Examined contexts with outstanding work and no progress.
    pub stalled: Vec<ContextId>,
}

impl ScanReport {
    /// Apply the decision rule.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        if self.ctx_count == self.idle_count {
            Verdict::Idle
        } else if self.progressed.is_some() {
            Verdict::Healthy
        } else {
            Verdict::Stuck
        }
    }
}

/// What a full cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum CycleOutcome {
    /// Nothing outstanding; no action.
    Idle,
    /// Progress observed; no action.
    Healthy,
    /// The recovery handler was invoked.
    Recovered {
        /// Recovery counter after this recovery.
        recovery_count: u64,
    },
    /// The device is stuck but the recovery policy skipped this cycle.
    Suppressed,
}

/// Runs scan cycles against a device's registry.
pub struct LivenessEvaluator {
    device: String,
    registry: Arc<ClientRegistry>,
    recovery: Arc<dyn RecoveryHandler>,
    stats: Arc<TdrStats>,
    policy: RecoveryPolicy,
    policy_state: Mutex<PolicyState>,
}

impl LivenessEvaluator {
    /// Create an evaluator for the given device.
    #[must_use]
    pub fn new(
        device: impl Into<String>,
        registry: Arc<ClientRegistry>,
        recovery: Arc<dyn RecoveryHandler>,
        stats: Arc<TdrStats>,
        policy: RecoveryPolicy,
    ) -> Self {
        Self {
            device: device.into(),
            registry,
            recovery,
            stats,
            policy,
            policy_state: Mutex::new(PolicyState::default()),
        }
    }

    /// Walk the registry once and update the progress snapshot of the first
    /// progressing context found.
    #[must_use]
    pub fn scan(&self) -> ScanReport {
        self.registry.with_clients(|clients| {
            let mut report = ScanReport::default();

            'clients: for client in clients {
                let contexts = client.contexts();
                for ctx in contexts.iter() {
                    let activity = ctx.activity();
                    let last = ctx.last_observed_completed();

                    tracing::debug!(
                        device = %self.device,
                        context = %ctx.id(),
                        name = ctx.name(),
                        submitted = activity.submitted,
                        completed = activity.completed,
                        last,
                        "Checking context activity"
                    );

                    report.ctx_count += 1;
                    if activity.is_idle() {
                        report.idle_count += 1;
                        continue;
                    }

                    if activity.completed != last {
                        ctx.observe_completed(activity.completed);
                        report.progressed = Some(ctx.id());
                        break 'clients;
                    }

                    report.stalled.push(ctx.id());
                }
            }

            report
        })
    }

    /// Run one full cycle: scan, decide, and recover if the device is stuck.
    ///
    /// The recovery handler is called after every lock has been released.
    pub fn run_cycle(&self) -> CycleOutcome {
        let (report, recovery_count) = {
            let mut policy_state = self.policy_state.lock();
            let report = self.scan();
            self.stats.inc_scan();

            match report.verdict() {
                Verdict::Idle => {
                    policy_state.on_clear();
                    self.stats.inc_idle_scan();
                    return CycleOutcome::Idle;
                }
                Verdict::Healthy => {
                    policy_state.on_clear();
                    self.stats.inc_healthy_scan();
                    return CycleOutcome::Healthy;
                }
                Verdict::Stuck => {}
            }

            if !policy_state.on_stuck(self.policy) {
                self.stats.inc_suppressed_recovery();
                tracing::info!(
                    device = %self.device,
                    stalled = report.stalled.len(),
                    "Device stuck, recovery suppressed by policy"
                );
                return CycleOutcome::Suppressed;
            }
            (report, self.stats.inc_recovery())
        };

        tracing::warn!(
            device = %self.device,
            recovery_count,
            contexts = report.ctx_count,
            stalled = ?report.stalled,
            "Recovering..."
        );

        let request = RecoveryRequest {
            device: self.device.clone(),
            recovery_count,
            stalled_contexts: report.stalled,
        };
        self.recovery.recover(&request);

        CycleOutcome::Recovered { recovery_count }
    }

    /// Shared diagnostic counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<TdrStats> {
        &self.stats
    }

    /// Active recovery policy.
    #[must_use]
    pub fn policy(&self) -> RecoveryPolicy {
        self.policy
    }
}

impl std::fmt::Debug for LivenessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessEvaluator")
            .field("device", &self.device)
            .field("clients", &self.registry.client_count())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
