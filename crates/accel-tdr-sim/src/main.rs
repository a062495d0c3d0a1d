//! accel-tdr-sim - drive a simulated accelerator and watch the hang watchdog
//! recover it.

#![deny(clippy::unwrap_used)]

mod output;
mod workload;

use accel_tdr::{ContextId, Device, RecoveryHandler, RecoveryPolicy, RecoveryRequest, TdrConfig};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::output::Summary;
use crate::workload::{HangPlan, HangScope, Workload};

#[derive(Parser, Debug)]
#[command(name = "accel-tdr-sim")]
#[command(about = "Simulate accelerator traffic, inject a device hang and report recoveries")]
#[command(version)]
struct Cli {
    /// Seconds between liveness scans (0 disables the watchdog)
    #[arg(long, default_value_t = 1)]
    interval_secs: u32,

    /// Number of clients
    #[arg(long, default_value_t = 2)]
    clients: usize,

    /// Contexts opened by each client
    #[arg(long, default_value_t = 2)]
    contexts: usize,

    /// Hang the device once any context has completed this many jobs
    #[arg(long)]
    hang_after: Option<u64>,

    /// Confine the hang to this context id; the others keep the device healthy
    #[arg(long, requires = "hang_after")]
    hang_context: Option<u32>,

    /// Stuck verdicts to suppress after each recovery
    #[arg(long)]
    cooldown_cycles: Option<u32>,

    /// Simulated per-job service time in milliseconds
    #[arg(long, default_value_t = 2)]
    job_ms: u64,

    /// How long to run the simulation
    #[arg(long, default_value_t = 5)]
    duration_secs: u64,

    /// Output in JSON format for machine parsing
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("accel_tdr={log_level},accel_tdr_sim={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let policy = cli
        .cooldown_cycles
        .map_or(RecoveryPolicy::EveryCycle, |cycles| RecoveryPolicy::Cooldown { cycles });
    let config = TdrConfig::builder()
        .scan_interval_secs(cli.interval_secs)
        .recovery_policy(policy)
        .build()
        .context("invalid watchdog configuration")?;

    let scope = cli
        .hang_context
        .map_or(HangScope::Device, |id| HangScope::Context(ContextId::new(id)));
    let hang = cli.hang_after.map(|after_completions| HangPlan {
        after_completions,
        scope,
    });
    let workload = Arc::new(Workload::new(hang, Duration::from_millis(cli.job_ms)));

    let recovery: Arc<dyn RecoveryHandler> = {
        let workload = Arc::clone(&workload);
        Arc::new(move |request: &RecoveryRequest| workload.recover(request))
    };
    let device = Device::new("sim0", config, Some(recovery))?;

    for client_index in 0..cli.clients {
        let pid = 1000 + i64::try_from(client_index)?;
        let client = device.open_client(pid);
        for i in 0..cli.contexts {
            workload.add_context(client.create_context(format!("pid{pid}-ctx{i}")));
        }
    }

    if let HangScope::Context(id) = scope {
        let known = device.query_contexts().iter().any(|info| info.context_id == id);
        anyhow::ensure!(known || cli.hang_after.is_none(), "no context with id {}", id.get());
    }

    let outcome = device.attach()?;
    tracing::info!(?outcome, "Watchdog state");

    let drivers = workload.spawn().context("failed to spawn workload threads")?;
    thread::sleep(Duration::from_secs(cli.duration_secs));
    workload.stop();
    for driver in drivers {
        if driver.join().is_err() {
            tracing::error!("Workload thread panicked");
        }
    }
    device.detach();

    let summary = Summary::collect(&device);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print();
    }
    Ok(())
}
