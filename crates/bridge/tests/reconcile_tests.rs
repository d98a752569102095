//! Auto-Attach Reconciliation Tests
//!
//! Drives the poller cycle by cycle on a paused clock to check the retry
//! backoff, the blocked set and the ordering of published events.
//!
//! # Test Scenarios
//! - Fixed backoff after a failed attach
//! - Blocked devices and re-enabling auto-attach
//! - Event ordering within one cycle
//!
//! Run with: `cargo test -p bridge --test reconcile_tests`

use bridge::{BridgeConfig, Poller, PollerControl};
use common::test_utils::{Scripted, ScriptedRunner, other_device, render_table, token};
use common::{CoreEvent, UiBridge, create_core_bridge};
use protocol::TokenStatus;
use std::sync::Arc;
use std::time::Duration;

fn setup(runner: &Arc<ScriptedRunner>) -> (Poller<ScriptedRunner>, UiBridge) {
    let (bridge, endpoint) = create_core_bridge();
    let poller = Poller::new(&BridgeConfig::default(), Arc::clone(runner), endpoint.events());
    (poller, bridge)
}

fn log_lines(events: &[CoreEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::LogLine(line) => Some(line.as_str()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Backoff Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_attach_waits_out_backoff() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.on("list", Scripted::ok(render_table(&[token("2-4", "Shared")])));
    runner.on("attach", Scripted::fail("device busy"));
    let (mut poller, bridge) = setup(&runner);

    // Cycles at T, T+10 and T+20 make a single attempt
    for _ in 0..3 {
        poller.run_cycle().await;
        tokio::time::advance(Duration::from_secs(10)).await;
    }
    assert_eq!(runner.call_count("attach"), 1);

    // T+30: the deadline has passed
    poller.run_cycle().await;
    assert_eq!(runner.call_count("attach"), 2);

    let events = bridge.drain_events();
    let failures: Vec<_> = log_lines(&events)
        .into_iter()
        .filter(|l| l.starts_with("Auto-attach failed for 2-4"))
        .collect();
    assert_eq!(failures.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failure_never_blocks() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.on("list", Scripted::ok(render_table(&[token("2-4", "Shared")])));
    runner.push("attach", Scripted::fail("device busy"));
    let (mut poller, _bridge) = setup(&runner);

    poller.run_cycle().await;
    assert!(!poller.reconciler().state().is_blocked("2-4"));
    assert!(poller.reconciler().state().retry_at("2-4").is_some());

    tokio::time::advance(Duration::from_secs(30)).await;
    poller.run_cycle().await;
    assert_eq!(runner.call_count("attach"), 2);
    assert!(poller.reconciler().state().retry_at("2-4").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failure_does_not_stop_later_devices() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.push(
        "list",
        Scripted::ok(render_table(&[token("1-1", "Not shared"), token("1-3", "Shared")])),
    );
    runner.on(
        "list",
        Scripted::ok(render_table(&[token("1-1", "Not shared"), token("1-3", "Attached")])),
    );
    runner.push("bind", Scripted::fail("access denied"));
    let (mut poller, bridge) = setup(&runner);

    poller.run_cycle().await;

    let events = bridge.drain_events();
    assert_eq!(log_lines(&events), vec![
        "Auto-attach failed for 1-1: bind failed for 1-1: access denied",
        "Auto-attach OK: 1-3.",
    ]);
    // The bind failure stops 1-1 before its attach call
    assert_eq!(runner.calls_to("attach"), vec![vec![
        "attach".to_string(),
        "--wsl".to_string(),
        "--busid".to_string(),
        "1-3".to_string(),
    ]]);
}

// ============================================================================
// Blocked Set Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_blocked_device_is_left_alone() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.on("list", Scripted::ok(render_table(&[token("2-4", "Not shared")])));
    let (mut poller, _bridge) = setup(&runner);

    poller.apply_control(PollerControl::Block("2-4".to_string()));
    for _ in 0..5 {
        poller.run_cycle().await;
        tokio::time::advance(Duration::from_secs(60)).await;
    }
    assert_eq!(runner.call_count("bind"), 0);
    assert_eq!(runner.call_count("attach"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reenabling_auto_attach_unblocks() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.on("list", Scripted::ok(render_table(&[token("2-4", "Shared")])));
    let (mut poller, bridge) = setup(&runner);

    poller.apply_control(PollerControl::Block("2-4".to_string()));
    poller.run_cycle().await;
    assert_eq!(runner.call_count("attach"), 0);

    poller.apply_control(PollerControl::SetAutoAttach(false));
    poller.apply_control(PollerControl::SetAutoAttach(true));
    poller.run_cycle().await;
    assert_eq!(runner.call_count("attach"), 1);

    let events = bridge.drain_events();
    assert!(log_lines(&events).contains(&"Auto-attach known devices enabled."));
}

#[tokio::test(start_paused = true)]
async fn test_manual_attach_clears_block_and_retry() {
    let runner = Arc::new(ScriptedRunner::new());
    let (mut poller, _bridge) = setup(&runner);

    poller.apply_control(PollerControl::Block("2-4".to_string()));
    poller.apply_control(PollerControl::ManualAttachSucceeded("2-4".to_string()));

    let state = poller.reconciler().state();
    assert!(!state.is_blocked("2-4"));
    assert!(state.retry_at("2-4").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_auto_attach_only_lists() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.on("list", Scripted::ok(render_table(&[token("2-4", "Shared")])));
    let (mut poller, bridge) = setup(&runner);

    poller.apply_control(PollerControl::SetAutoAttach(false));
    poller.run_cycle().await;

    assert_eq!(runner.call_count("list"), 1);
    assert_eq!(runner.calls().len(), 1);
    let events = bridge.drain_events();
    assert!(events.contains(&CoreEvent::StatusChanged {
        status: TokenStatus::HostOnly,
        description: TokenStatus::HostOnly.description().to_string(),
    }));
}

// ============================================================================
// Event Ordering Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_success_log_precedes_status_change() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.push("list", Scripted::ok(render_table(&[token("2-4", "Shared")])));
    runner.on("list", Scripted::ok(render_table(&[token("2-4", "Attached")])));
    let (mut poller, bridge) = setup(&runner);

    poller.run_cycle().await;

    let events = bridge.drain_events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], CoreEvent::LogLine("Auto-attach OK: 2-4.".to_string()));
    assert_eq!(events[1], CoreEvent::StatusChanged {
        status: TokenStatus::AttachedToGuest,
        description: "Security key: attached to WSL".to_string(),
    });
    assert!(matches!(events[2], CoreEvent::SnapshotUpdated { .. }));
    // Re-fetched after the attach
    assert_eq!(runner.call_count("list"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_eligible_devices_is_absent() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.on(
        "list",
        Scripted::ok(render_table(&[
            other_device("1-1", "Not shared"),
            other_device("1-2", "Shared"),
        ])),
    );
    let (mut poller, bridge) = setup(&runner);

    poller.run_cycle().await;

    assert_eq!(runner.calls().len(), 1);
    let events = bridge.drain_events();
    assert_eq!(events[0], CoreEvent::StatusChanged {
        status: TokenStatus::Absent,
        description: "Security key: not detected on host".to_string(),
    });
    match &events[1] {
        CoreEvent::SnapshotUpdated { devices, total, .. } => {
            assert!(devices.is_empty());
            assert_eq!(*total, 2);
        }
        other => panic!("expected snapshot, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_refetch_failure_is_degraded() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.push("list", Scripted::ok(render_table(&[token("2-4", "Shared")])));
    runner.on("list", Scripted::Timeout);
    let (mut poller, bridge) = setup(&runner);

    poller.run_cycle().await;

    let events = bridge.drain_events();
    assert_eq!(log_lines(&events)[0], "Auto-attach OK: 2-4.");
    assert!(log_lines(&events)[1].starts_with("Refresh failed: Command `usbipd list` timed out"));
    assert!(matches!(
        events.last(),
        Some(CoreEvent::StatusChanged { status: TokenStatus::Absent, .. })
    ));
}
