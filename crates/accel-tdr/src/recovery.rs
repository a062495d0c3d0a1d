//! Recovery handler interface.
//!
//! The device layer supplies the actual reset procedure. The watchdog only
//! decides when to call it.

use serde::{Deserialize, Serialize};

use crate::context::ContextId;

/// Details handed to the recovery handler on a stuck verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    /// Name of the device being recovered.
    pub device: String,
    /// Total recoveries triggered, including this one.
    pub recovery_count: u64,
    /// Contexts with outstanding work that made no progress over the interval.
    pub stalled_contexts: Vec<ContextId>,
}

/// Device-specific recovery procedure.
///
/// Called from the watchdog's scan worker with no registry lock held. It may
/// block. It may be called again on the next cycle if the device is still
/// stuck.
pub trait RecoveryHandler: Send + Sync {
    /// Recover the device.
    fn recover(&self, request: &RecoveryRequest);
}

impl<F> RecoveryHandler for F
where
    F: Fn(&RecoveryRequest) + Send + Sync,
{
    fn recover(&self, request: &RecoveryRequest) {
        self(request);
    }
}
