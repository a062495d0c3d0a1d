//! Simulated submission and completion traffic.
//!
//! Each context gets one driver thread that keeps a few jobs in flight and
//! completes them after a fixed service time. The device can be told to
//! hang: once any context reaches a completion count, no context completes
//! anything until the device is recovered. A hang can also be confined to a
//! single context, in which case the other contexts keep the device healthy
//! and the watchdog leaves it alone.

use accel_tdr::{ContextId, HwContext, RecoveryRequest};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const QUEUE_DEPTH: u64 = 4;

/// What stops completing when the hang fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangScope {
    /// Every context.
    Device,
    /// Only this context.
    Context(ContextId),
}

/// When and where to inject a hang.
#[derive(Debug, Clone, Copy)]
pub struct HangPlan {
    /// Completions a context performs before the hang fires. With
    /// [`HangScope::Device`] any context can trigger it.
    pub after_completions: u64,
    /// Contexts the hang applies to.
    pub scope: HangScope,
}

impl HangPlan {
    fn affects(&self, ctx: ContextId) -> bool {
        match self.scope {
            HangScope::Device => true,
            HangScope::Context(target) => target == ctx,
        }
    }
}

/// Shared state of the simulated device traffic.
#[derive(Debug)]
pub struct Workload {
    contexts: RwLock<Vec<Arc<HwContext>>>,
    hang: Option<HangPlan>,
    job_time: Duration,
    hang_triggered: AtomicBool,
    hung: AtomicBool,
    stop: AtomicBool,
}

impl Workload {
    pub fn new(hang: Option<HangPlan>, job_time: Duration) -> Self {
        Self {
            contexts: RwLock::new(Vec::new()),
            hang,
            job_time,
            hang_triggered: AtomicBool::new(false),
            hung: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }

    pub fn add_context(&self, ctx: Arc<HwContext>) {
        self.contexts.write().push(ctx);
    }

    /// Spawn one driver thread per registered context.
    pub fn spawn(self: &Arc<Self>) -> std::io::Result<Vec<JoinHandle<()>>> {
        let contexts = self.contexts.read().clone();
        contexts
            .into_iter()
            .map(|ctx| {
                let workload = Arc::clone(self);
                thread::Builder::new()
                    .name(format!("sim-{}", ctx.id()))
                    .spawn(move || workload.drive(&ctx))
            })
            .collect()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    fn drive(&self, ctx: &HwContext) {
        while !self.stop.load(Ordering::Acquire) {
            if ctx.activity().outstanding() < QUEUE_DEPTH {
                ctx.record_submission();
            }
            thread::sleep(self.job_time);

            if self.should_hang(ctx) {
                continue;
            }
            ctx.complete_outstanding();
        }
    }

    fn should_hang(&self, ctx: &HwContext) -> bool {
        let Some(plan) = self.hang else {
            return false;
        };
        if !plan.affects(ctx.id()) {
            return false;
        }
        if self.hung.load(Ordering::Acquire) {
            return true;
        }
        if ctx.activity().completed >= plan.after_completions
            && !self.hang_triggered.swap(true, Ordering::AcqRel)
        {
            tracing::info!(context = %ctx.id(), scope = ?plan.scope, "Injecting hang");
            self.hung.store(true, Ordering::Release);
            return true;
        }
        false
    }

    /// Device recovery: abort in-flight work on the stalled contexts and
    /// let the device run again.
    pub fn recover(&self, request: &RecoveryRequest) {
        let contexts = self.contexts.read();
        for id in &request.stalled_contexts {
            if let Some(ctx) = find(&contexts, *id) {
                let retired = ctx.retire_outstanding();
                tracing::info!(context = %id, retired, "Retired outstanding jobs");
            }
        }
        self.hung.store(false, Ordering::Release);
    }
}

fn find(contexts: &[Arc<HwContext>], id: ContextId) -> Option<&Arc<HwContext>> {
    contexts.iter().find(|ctx| ctx.id() == id)
}
