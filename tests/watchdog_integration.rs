//! Integration tests for the health watchdog
//!
//! Time is driven by a manual clock; periodic checks run either through the
//! manual scheduler or through tokio with paused time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{manual_clock, memory_store, Callback, RecordingHandler, T0};
use scalper_core::common::store::{load_typed, save_typed, WATCHDOG_STATE_KEY};
use scalper_core::config::WatchdogConfig;
use scalper_core::watchdog::{ModuleHealth, WatchdogSnapshot};
use scalper_core::{
    FileSnapshotStore, HealthWatchdog, ManualScheduler, OverallHealth, TokioScheduler,
};

fn watchdog(
    handler: &RecordingHandler,
) -> (HealthWatchdog, scalper_core::ManualClock, scalper_core::MemorySnapshotStore) {
    let clock = manual_clock();
    let store = memory_store();
    let wd = HealthWatchdog::new(
        WatchdogConfig::default(),
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        Arc::new(handler.clone()),
    );
    (wd, clock, store)
}

// ============================================================================
// Stall detection and restarts
// ============================================================================

#[test_log::test]
fn test_one_restart_per_stall() {
    let handler = RecordingHandler::new();
    let (wd, clock, _) = watchdog(&handler);
    let scheduler = ManualScheduler::new();
    wd.register_module("pair-scanner");
    wd.register_module("order-executor");
    wd.start(&scheduler);

    // order-executor keeps beating, pair-scanner goes quiet
    for _ in 0..4 {
        clock.advance(5_000);
        wd.heartbeat("order-executor");
        scheduler.run_pending();
    }

    assert_eq!(handler.restarts(), vec![("pair-scanner".to_string(), 1)]);
    assert_eq!(
        handler.calls().first(),
        Some(&Callback::Unhealthy("pair-scanner".to_string()))
    );
    let status = wd.get_status();
    assert_eq!(status.overall_health, OverallHealth::Critical);

    // A second full stall window brings a second restart
    for _ in 0..4 {
        clock.advance(5_000);
        wd.heartbeat("order-executor");
        scheduler.run_pending();
    }
    assert_eq!(
        handler.restarts(),
        vec![("pair-scanner".to_string(), 1), ("pair-scanner".to_string(), 2)]
    );

    wd.heartbeat("pair-scanner");
    assert_eq!(wd.get_status().overall_health, OverallHealth::Healthy);
    wd.stop();
}

#[test]
fn test_unregister_stops_monitoring() {
    let handler = RecordingHandler::new();
    let (wd, clock, _) = watchdog(&handler);
    wd.register_module("ai-analyzer");
    assert!(wd.unregister_module("ai-analyzer"));
    assert!(!wd.unregister_module("ai-analyzer"));

    clock.advance(60_000);
    assert!(wd.check_health().is_empty());
    assert!(handler.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tokio_scheduler_drives_checks() {
    let handler = RecordingHandler::new();
    let (wd, clock, store) = watchdog(&handler);
    wd.register_module("pair-scanner");
    wd.start(&TokioScheduler);

    clock.advance(15_001);
    tokio::time::sleep(Duration::from_millis(5_001)).await;

    assert_eq!(handler.restarts(), vec![("pair-scanner".to_string(), 1)]);
    assert!(store.contains(WATCHDOG_STATE_KEY));

    wd.stop();
    clock.advance(60_000);
    tokio::time::sleep(Duration::from_millis(20_000)).await;
    assert_eq!(handler.restarts().len(), 1);
}

// ============================================================================
// Connections
// ============================================================================

#[test]
fn test_connection_loss_and_recovery_edges() {
    let handler = RecordingHandler::new();
    let (wd, _, _) = watchdog(&handler);
    wd.register_connection("binance");
    wd.register_connection("bybit");

    wd.update_connection_status("binance", false);
    wd.update_connection_status("binance", false);
    wd.update_connection_status("binance", true);
    wd.update_connection_status("binance", false);

    assert_eq!(
        handler.calls(),
        vec![
            Callback::ConnectionLost("binance".into(), 1),
            Callback::ConnectionRestored("binance".into()),
            Callback::ConnectionLost("binance".into(), 1),
        ]
    );
    assert_eq!(wd.get_status().overall_health, OverallHealth::Critical);
}

// ============================================================================
// Snapshot persistence
// ============================================================================

#[test]
fn test_snapshot_survives_restart_via_file_store() {
    let dir = std::env::temp_dir().join(format!("scalper_wd_{}", std::process::id()));
    let clock = manual_clock();
    let handler = RecordingHandler::new();

    {
        let store = Arc::new(FileSnapshotStore::new(&dir).unwrap());
        let wd = HealthWatchdog::new(
            WatchdogConfig::default(),
            store,
            Arc::new(clock.clone()),
            Arc::new(handler.clone()),
        );
        wd.register_module("order-executor");
        wd.report_error("order-executor", "timeout");
        wd.register_connection("okx");
        wd.stop();
    }

    clock.advance(4 * 60 * 1_000);
    let store = Arc::new(FileSnapshotStore::new(&dir).unwrap());
    let wd = HealthWatchdog::new(
        WatchdogConfig::default(),
        store,
        Arc::new(clock.clone()),
        Arc::new(handler),
    );
    let module = wd.module("order-executor").unwrap();
    assert_eq!(module.consecutive_errors, 1);
    assert!(wd.connection("okx").is_some());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_stale_snapshot_is_ignored_not_merged() {
    let store = memory_store();
    let stale = WatchdogSnapshot {
        last_check_time: T0 - 5 * 60 * 1_000,
        modules: vec![(
            "pair-scanner".to_string(),
            ModuleHealth::new("pair-scanner", T0 - 5 * 60 * 1_000),
        )],
        connections: vec![],
    };
    save_typed(&store, WATCHDOG_STATE_KEY, &stale).unwrap();

    let wd = HealthWatchdog::new(
        WatchdogConfig::default(),
        Arc::new(store.clone()),
        Arc::new(manual_clock()),
        Arc::new(RecordingHandler::new()),
    );
    assert!(wd.get_status().modules.is_empty());

    wd.register_module("order-executor");
    wd.check_health();
    let saved: WatchdogSnapshot = load_typed(&store, WATCHDOG_STATE_KEY).unwrap().unwrap();
    assert_eq!(saved.last_check_time, T0);
    assert_eq!(saved.modules.len(), 1);
    assert_eq!(saved.modules[0].0, "order-executor");
}

#[test]
fn test_sessions_are_isolated() {
    let a = RecordingHandler::new();
    let b = RecordingHandler::new();
    let (wd_a, clock_a, _) = watchdog(&a);
    let (wd_b, _, _) = watchdog(&b);

    wd_a.register_module("pair-scanner");
    wd_b.register_module("pair-scanner");
    clock_a.advance(20_000);
    wd_a.check_health();
    wd_b.check_health();

    assert_eq!(a.restarts().len(), 1);
    assert!(b.restarts().is_empty());
}
