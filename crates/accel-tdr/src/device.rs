//! Device facade tying the registry, the recovery procedure and the watchdog
//! together.

use std::sync::Arc;

use crate::config::TdrConfig;
use crate::context::{ClientId, ContextInfo};
use crate::error::{TdrError, TdrResult};
use crate::evaluator::{CycleOutcome, LivenessEvaluator};
use crate::recovery::RecoveryHandler;
use crate::registry::{Client, ClientRegistry};
use crate::stats::{TdrStats, TdrStatsSnapshot};
use crate::watchdog::{StartOutcome, Watchdog};

/// An accelerator device with its clients and its hang watchdog.
#[derive(Debug)]
pub struct Device {
    name: String,
    config: TdrConfig,
    registry: Arc<ClientRegistry>,
    stats: Arc<TdrStats>,
    watchdog: Watchdog,
}

impl Device {
    /// Create a device. The watchdog is created stopped.
    ///
    /// `recovery` is `None` for devices that cannot be recovered, which
    /// disables the watchdog.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        name: impl Into<String>,
        config: TdrConfig,
        recovery: Option<Arc<dyn RecoveryHandler>>,
    ) -> TdrResult<Self> {
        config.validate()?;

        let name = name.into();
        let registry = Arc::new(ClientRegistry::new());
        let stats = Arc::new(TdrStats::new());
        let evaluator = recovery.map(|recovery| {
            Arc::new(LivenessEvaluator::new(
                name.clone(),
                Arc::clone(&registry),
                recovery,
                Arc::clone(&stats),
                config.recovery_policy,
            ))
        });
        let interval = config.scan_interval().unwrap_or_default();

        Ok(Self {
            name,
            config,
            registry,
            stats,
            watchdog: Watchdog::new(interval, evaluator),
        })
    }

    /// Device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TdrConfig {
        &self.config
    }

    /// Start the watchdog. Call when the device is attached.
    ///
    /// # Errors
    ///
    /// Returns an error if a watchdog thread cannot be spawned.
    pub fn attach(&self) -> TdrResult<StartOutcome> {
        let outcome = self.watchdog.start()?;
        tracing::info!(device = %self.name, ?outcome, "Device attached");
        Ok(outcome)
    }

    /// Stop the watchdog. Call when the device is detached.
    pub fn detach(&self) {
        self.watchdog.stop();
        tracing::info!(device = %self.name, "Device detached");
    }

    /// The device's watchdog.
    #[must_use]
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// The device's client registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Register a client for the given process.
    pub fn open_client(&self, pid: i64) -> Arc<Client> {
        self.registry.open_client(pid)
    }

    /// Remove a client and its contexts.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not registered.
    pub fn close_client(&self, id: ClientId) -> TdrResult<Arc<Client>> {
        self.registry.close_client(id)
    }

    /// Look up a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not registered.
    pub fn client(&self, id: ClientId) -> TdrResult<Arc<Client>> {
        self.registry
            .client(id)
            .ok_or_else(|| TdrError::client_not_found(id))
    }

    /// Query records for every open hardware context.
    #[must_use]
    pub fn query_contexts(&self) -> Vec<ContextInfo> {
        self.registry.context_infos()
    }

    /// Run one scan cycle on the calling thread.
    ///
    /// Returns `None` if the device has no recovery procedure.
    pub fn check_liveness(&self) -> Option<CycleOutcome> {
        self.watchdog
            .evaluator()
            .map(|evaluator| evaluator.run_cycle())
    }

    /// Total recoveries triggered by the watchdog.
    #[must_use]
    pub fn recovery_count(&self) -> u64 {
        self.stats.recoveries()
    }

    /// Watchdog diagnostic counters.
    #[must_use]
    pub fn stats(&self) -> TdrStatsSnapshot {
        self.stats.snapshot()
    }
}
