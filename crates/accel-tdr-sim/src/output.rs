//! Simulation report.

use accel_tdr::{ContextInfo, Device, TdrConfig, TdrStatsSnapshot};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Summary {
    pub device: String,
    pub config: TdrConfig,
    pub stats: TdrStatsSnapshot,
    pub contexts: Vec<ContextInfo>,
}

impl Summary {
    pub fn collect(device: &Device) -> Self {
        Self {
            device: device.name().to_string(),
            config: device.config().clone(),
            stats: device.stats(),
            contexts: device.query_contexts(),
        }
    }

    pub fn print(&self) {
        println!("Device {}", self.device);
        println!(
            "  scans: {}  recoveries: {}  suppressed: {}  idle: {}  healthy: {}  coalesced ticks: {}",
            self.stats.scans,
            self.stats.recoveries,
            self.stats.suppressed_recoveries,
            self.stats.idle_scans,
            self.stats.healthy_scans,
            self.stats.skipped_dispatches,
        );
        println!();
        println!(
            "  {:<8} {:<10} {:<18} {:>10} {:>10} {:>8}",
            "CONTEXT", "CLIENT", "NAME", "SUBMITTED", "COMPLETED", "ERRORS"
        );
        for ctx in &self.contexts {
            println!(
                "  {:<8} {:<10} {:<18} {:>10} {:>10} {:>8}",
                ctx.context_id.to_string(),
                ctx.client_id.to_string(),
                ctx.name,
                ctx.command_submissions,
                ctx.command_completions,
                ctx.errors,
            );
        }
    }
}
