//! Prelude for accel-tdr.
//!
//! This module re-exports the most commonly used types for convenient importing.
//!
//! # Example
//!
//! ```rust
//! use accel_tdr::prelude::*;
//!
//! let device = Device::new("npu0", TdrConfig::default(), None)?;
//! assert_eq!(
//!     device.attach()?,
//!     StartOutcome::Disabled(DisabledReason::NoRecovery)
//! );
//! # Ok::<(), TdrError>(())
//! ```

pub use crate::config::{TdrConfig, TdrConfigBuilder};
pub use crate::context::{Activity, ClientId, ContextId, ContextInfo, HwContext};
pub use crate::device::Device;
pub use crate::error::{TdrError, TdrResult};
pub use crate::evaluator::{CycleOutcome, LivenessEvaluator, ScanReport, Verdict};
pub use crate::policy::RecoveryPolicy;
pub use crate::recovery::{RecoveryHandler, RecoveryRequest};
pub use crate::registry::{Client, ClientRegistry};
pub use crate::stats::{TdrStats, TdrStatsSnapshot};
pub use crate::watchdog::{DisabledReason, StartOutcome, Watchdog};
