//! Concurrency tests for the registry and the liveness scan.

use accel_tdr::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn noop_recovery() -> Option<Arc<dyn RecoveryHandler>> {
    Some(Arc::new(|_: &RecoveryRequest| {}))
}

#[test]
fn test_context_churn_during_scans() -> TestResult {
    let device = Arc::new(Device::new("npu0", TdrConfig::default(), noop_recovery())?);
    let stop = Arc::new(AtomicBool::new(false));

    let scanner = {
        let device = Arc::clone(&device);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut cycles = 0_u64;
            while !stop.load(Ordering::Acquire) {
                device.check_liveness();
                cycles += 1;
            }
            cycles
        })
    };

    let mut handles = vec![];
    for pid in 0..4 {
        let device = Arc::clone(&device);
        handles.push(thread::spawn(move || -> TdrResult<()> {
            let client = device.open_client(pid);
            for i in 0..100 {
                let ctx = client.create_context(format!("ctx{i}"));
                ctx.record_submission();
                if i % 2 == 0 {
                    ctx.record_completion();
                }
                client.destroy_context(ctx.id())?;
            }
            device.close_client(client.id())?;
            Ok(())
        }));
    }

    for handle in handles {
        let result = handle.join().map_err(|_| "worker thread panicked")?;
        result?;
    }
    stop.store(true, Ordering::Release);
    let cycles = scanner.join().map_err(|_| "scanner thread panicked")?;

    assert!(cycles > 0);
    assert_eq!(device.registry().client_count(), 0);
    assert!(device.query_contexts().is_empty());
    Ok(())
}

#[test]
fn test_counters_stay_consistent_under_load() -> TestResult {
    let device = Arc::new(Device::new("npu0", TdrConfig::default(), noop_recovery())?);
    let client = device.open_client(1);
    let contexts: Vec<_> = (0..4)
        .map(|i| client.create_context(format!("ctx{i}")))
        .collect();
    let stop = Arc::new(AtomicBool::new(false));

    let mut handles = vec![];
    for ctx in &contexts {
        let submitter = {
            let ctx = Arc::clone(ctx);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    ctx.record_submission();
                    thread::yield_now();
                }
            })
        };
        let completer = {
            let ctx = Arc::clone(ctx);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    if ctx.activity().outstanding() > 0 {
                        ctx.record_completion();
                    }
                    thread::yield_now();
                }
            })
        };
        handles.push(submitter);
        handles.push(completer);
    }

    for _ in 0..500 {
        device.check_liveness();
        for ctx in &contexts {
            let last = ctx.last_observed_completed();
            let activity = ctx.activity();
            assert!(activity.completed <= activity.submitted);
            assert!(last <= activity.completed);
        }
    }

    stop.store(true, Ordering::Release);
    for handle in handles {
        handle.join().map_err(|_| "counter thread panicked")?;
    }
    Ok(())
}

#[test]
fn test_destroy_waits_for_reader() -> TestResult {
    let device = Device::new("npu0", TdrConfig::default(), noop_recovery())?;
    let client = device.open_client(1);
    let ctx = client.create_context("victim");
    let id = ctx.id();
    drop(ctx);

    let snapshot = client.contexts();
    let destroyer = {
        let client = Arc::clone(&client);
        thread::spawn(move || client.destroy_context(id))
    };

    thread::sleep(Duration::from_millis(20));
    assert!(!destroyer.is_finished());
    assert!(client.context(id).is_none());
    assert_eq!(snapshot.len(), 1);

    drop(snapshot);
    let removed = destroyer.join().map_err(|_| "destroyer panicked")??;
    assert_eq!(removed.id(), id);
    Ok(())
}

#[test]
fn test_close_client_while_watchdog_running() -> TestResult {
    let device = Device::new("npu0", TdrConfig::default(), noop_recovery())?;
    let evaluator = device
        .watchdog()
        .evaluator()
        .cloned()
        .ok_or("no evaluator")?;
    let watchdog = Watchdog::new(Duration::from_millis(2), Some(evaluator));
    watchdog.start()?;

    for pid in 0..20 {
        let client = device.open_client(pid);
        for i in 0..5 {
            client.create_context(format!("ctx{i}")).record_submission();
        }
        thread::sleep(Duration::from_millis(1));
        device.close_client(client.id())?;
    }

    watchdog.stop();
    assert_eq!(device.registry().client_count(), 0);
    assert!(device.stats().scans > 0);
    Ok(())
}
