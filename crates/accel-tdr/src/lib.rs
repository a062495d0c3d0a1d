//! # accel-tdr
//!
//! Timeout detection and recovery for hardware accelerators that run work
//! for many concurrent execution contexts.
//!
//! Every context counts the jobs it submitted and the jobs the device
//! completed. A watchdog scans all contexts once per interval. If some
//! context has outstanding work and no context completed anything since the
//! previous scan, completion notifications can no longer be trusted to
//! arrive and the device's recovery procedure is invoked.
//!
//! ## Guarantees
//!
//! - **Lock-free hot path**: submission and completion are one atomic add
//! - **Non-blocking scans**: a scan never blocks context creation, and
//!   context removal waits only for scans already looking at the context
//! - **Bounded detection latency**: a hang is detected between one and two
//!   scan intervals after the last completion
//! - **Clean shutdown**: no scan runs after [`Watchdog::stop`] returns
//!
//! ## Architecture
//!
//! - [`context`] - Per-context activity counters
//! - [`rcu`] - Read-mostly publication with a reader grace period
//! - [`registry`] - Clients, their contexts and the structural lock
//! - [`evaluator`] - One liveness scan and the recovery decision
//! - [`watchdog`] - Periodic scheduling and start/stop lifecycle
//! - [`recovery`] - Device-supplied recovery procedure
//! - [`policy`] - Suppression of repeated recoveries
//! - [`device`] - Facade used by the device layer
//! - [`config`], [`stats`], [`error`] - Configuration, diagnostics, errors
//!
//! ## Example
//!
//! ```rust
//! use accel_tdr::prelude::*;
//! use std::sync::Arc;
//!
//! let recovery: Arc<dyn RecoveryHandler> = Arc::new(|request: &RecoveryRequest| {
//!     println!("resetting {} (#{})", request.device, request.recovery_count);
//! });
//! let device = Device::new("npu0", TdrConfig::default(), Some(recovery))?;
//!
//! let client = device.open_client(1234);
//! let ctx = client.create_context("inference");
//! ctx.record_submission();
//!
//! // Nothing has completed since the context was created.
//! let outcome = device.check_liveness();
//! assert_eq!(outcome, Some(CycleOutcome::Recovered { recovery_count: 1 }));
//! # Ok::<(), TdrError>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod evaluator;
pub mod policy;
pub mod rcu;
pub mod recovery;
pub mod registry;
pub mod stats;
pub mod watchdog;

pub mod prelude;

pub use config::{TdrConfig, TdrConfigBuilder};
pub use context::{Activity, ClientId, ContextId, ContextInfo, HwContext};
pub use device::Device;
pub use error::{TdrError, TdrResult};
pub use evaluator::{CycleOutcome, LivenessEvaluator, ScanReport, Verdict};
pub use policy::RecoveryPolicy;
pub use rcu::ReadMostly;
pub use recovery::{RecoveryHandler, RecoveryRequest};
pub use registry::{Client, ClientRegistry, ContextSet};
pub use stats::{TdrStats, TdrStatsSnapshot};
pub use watchdog::{DisabledReason, StartOutcome, Watchdog};
