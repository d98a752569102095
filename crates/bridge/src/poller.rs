//! Poll loop
//!
//! The poller owns the reconciler and runs one cycle per poll interval:
//! fetch, reconcile, re-fetch if anything was attached, aggregate, then
//! publish what changed. Control messages end the idle wait early.

use crate::config::BridgeConfig;
use crate::reconcile::Reconciler;
use crate::usbipd::{Gateway, fetch_snapshot};
use common::{CoreEvent, EventSender, Result, ToolRunner};
use protocol::{Allowlist, DeviceRecord, TokenStatus, aggregate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Messages that change poller-owned state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerControl {
    /// Run a cycle now and publish the device list even if unchanged
    Refresh,
    SetAutoAttach(bool),
    SetShowAll(bool),
    /// A user unbind or detach succeeded for this busid
    Block(String),
    /// A user attach succeeded for this busid
    ManualAttachSucceeded(String),
}

/// Last published visible list
#[derive(Debug, Clone, PartialEq, Eq)]
struct VisibleList {
    devices: Vec<DeviceRecord>,
    total: usize,
    show_all: bool,
}

/// Periodic fetch / reconcile / publish loop
pub struct Poller<R> {
    gateway: Gateway<R>,
    reconciler: Reconciler,
    allowlist: Allowlist,
    events: EventSender,
    interval: Duration,
    list_timeout: Duration,
    auto_attach: bool,
    show_all: bool,
    force_snapshot: bool,
    last_status: Option<(TokenStatus, String)>,
    last_visible: Option<VisibleList>,
}

impl<R: ToolRunner> Poller<R> {
    pub fn new(config: &BridgeConfig, runner: Arc<R>, events: EventSender) -> Self {
        let timing = config.timing;
        Self {
            gateway: Gateway::new(runner, timing.operation_timeout()),
            reconciler: Reconciler::new(config.allowlist.clone(), timing.retry_backoff()),
            allowlist: config.allowlist.clone(),
            events,
            interval: timing.poll_interval(),
            list_timeout: timing.list_timeout(),
            auto_attach: config.auto_attach,
            show_all: config.show_all,
            force_snapshot: true,
            last_status: None,
            last_visible: None,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn auto_attach(&self) -> bool {
        self.auto_attach
    }

    pub fn show_all(&self) -> bool {
        self.show_all
    }

    /// Apply one control message
    pub fn apply_control(&mut self, msg: PollerControl) {
        debug!("Poller control: {:?}", msg);
        match msg {
            PollerControl::Refresh => {
                self.force_snapshot = true;
            }
            PollerControl::SetAutoAttach(enabled) => {
                // Blocks clear only on an off-to-on transition
                if enabled && !self.auto_attach {
                    self.reconciler.state_mut().clear_blocks();
                }
                self.auto_attach = enabled;
                self.force_snapshot = true;
                let state = if enabled { "enabled" } else { "disabled" };
                self.emit(CoreEvent::LogLine(format!(
                    "Auto-attach known devices {}.",
                    state
                )));
            }
            PollerControl::SetShowAll(show_all) => {
                self.show_all = show_all;
                self.force_snapshot = true;
            }
            PollerControl::Block(busid) => {
                info!("Auto-attach blocked for {}", busid);
                self.reconciler.state_mut().block(&busid);
            }
            PollerControl::ManualAttachSucceeded(busid) => {
                self.reconciler.state_mut().record_manual_attach(&busid);
            }
        }
    }

    /// Run one poll cycle
    ///
    /// Never fails: errors become a log line and a degraded status.
    pub async fn run_cycle(&mut self) {
        let now = Instant::now();
        let force = std::mem::take(&mut self.force_snapshot);
        let mut logs = Vec::new();

        let result = self.fetch_and_reconcile(now, &mut logs).await;

        for line in logs {
            self.emit(CoreEvent::LogLine(line));
        }

        match result {
            Ok(snapshot) => {
                let status = aggregate(&snapshot, &self.allowlist);
                self.publish_status(status, status.description().to_string());
                self.publish_snapshot(&snapshot, force);
            }
            Err(e) => {
                warn!("Poll cycle failed: {}", e);
                let message = e.to_string();
                self.emit(CoreEvent::LogLine(format!("Refresh failed: {}", message)));
                self.publish_status(
                    TokenStatus::Absent,
                    TokenStatus::degraded_description(&message),
                );
            }
        }
    }

    /// Run until the stop signal is set or its sender is dropped
    pub async fn run(
        mut self,
        mut control: mpsc::UnboundedReceiver<PollerControl>,
        mut stop: watch::Receiver<bool>,
    ) {
        info!("Poller started (interval {}s)", self.interval.as_secs());
        let mut control_open = true;

        loop {
            if *stop.borrow() || self.events.is_closed() {
                break;
            }

            while let Ok(msg) = control.try_recv() {
                self.apply_control(msg);
            }

            self.run_cycle().await;

            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                msg = control.recv(), if control_open => match msg {
                    Some(msg) => self.apply_control(msg),
                    None => control_open = false,
                },
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Poller stopped");
    }

    async fn fetch_and_reconcile(
        &mut self,
        now: Instant,
        logs: &mut Vec<String>,
    ) -> Result<Vec<DeviceRecord>> {
        let snapshot = fetch_snapshot(self.gateway.runner().as_ref(), self.list_timeout).await?;
        if !self.auto_attach {
            return Ok(snapshot);
        }

        let outcome = self.reconciler.reconcile(&snapshot, now, &self.gateway).await;
        logs.extend(outcome.logs);

        if outcome.changed {
            fetch_snapshot(self.gateway.runner().as_ref(), self.list_timeout).await
        } else {
            Ok(snapshot)
        }
    }

    fn publish_status(&mut self, status: TokenStatus, description: String) {
        let current = (status, description);
        if self.last_status.as_ref() == Some(&current) {
            return;
        }
        info!("Token status: {}", current.1);
        self.last_status = Some(current.clone());
        self.emit(CoreEvent::StatusChanged {
            status: current.0,
            description: current.1,
        });
    }

    fn publish_snapshot(&mut self, snapshot: &[DeviceRecord], force: bool) {
        let devices: Vec<DeviceRecord> = if self.show_all {
            snapshot.to_vec()
        } else {
            self.allowlist.eligible(snapshot).cloned().collect()
        };
        let visible = VisibleList {
            devices,
            total: snapshot.len(),
            show_all: self.show_all,
        };

        if !force && self.last_visible.as_ref() == Some(&visible) {
            return;
        }
        self.last_visible = Some(visible.clone());
        self.emit(CoreEvent::SnapshotUpdated {
            devices: visible.devices,
            total: visible.total,
            show_all: visible.show_all,
        });
    }

    fn emit(&self, event: CoreEvent) {
        if let Err(e) = self.events.send(event) {
            debug!("Dropping event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::create_core_bridge;
    use common::test_utils::{Scripted, ScriptedRunner, other_device, render_table, token};

    fn poller(runner: Arc<ScriptedRunner>) -> (Poller<ScriptedRunner>, common::UiBridge) {
        let (bridge, endpoint) = create_core_bridge();
        let poller = Poller::new(&BridgeConfig::default(), runner, endpoint.events());
        (poller, bridge)
    }

    #[tokio::test]
    async fn test_unchanged_cycle_publishes_nothing() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("list", Scripted::ok(render_table(&[token("1-1", "Attached")])));
        let (mut poller, bridge) = poller(runner);

        poller.run_cycle().await;
        assert_eq!(bridge.drain_events().len(), 2);

        poller.run_cycle().await;
        assert!(bridge.drain_events().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_forces_snapshot() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("list", Scripted::ok(render_table(&[token("1-1", "Attached")])));
        let (mut poller, bridge) = poller(runner);
        poller.run_cycle().await;
        bridge.drain_events();

        poller.apply_control(PollerControl::Refresh);
        poller.run_cycle().await;

        let events = bridge.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CoreEvent::SnapshotUpdated { .. }));
    }

    #[tokio::test]
    async fn test_show_all_changes_visible_list() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(
            "list",
            Scripted::ok(render_table(&[
                token("1-1", "Attached"),
                other_device("1-2", "Not shared"),
            ])),
        );
        let (mut poller, bridge) = poller(runner);
        poller.run_cycle().await;
        let first = bridge.drain_events();
        assert_eq!(first.last().and_then(CoreEvent::hidden_count), Some(1));

        poller.apply_control(PollerControl::SetShowAll(true));
        poller.run_cycle().await;
        let events = bridge.drain_events();
        match events.as_slice() {
            [CoreEvent::SnapshotUpdated { devices, total, show_all }] => {
                assert_eq!(devices.len(), 2);
                assert_eq!(*total, 2);
                assert!(*show_all);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_is_degraded_status() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("list", Scripted::fail("service unavailable"));
        let (mut poller, bridge) = poller(runner);

        poller.run_cycle().await;
        let events = bridge.drain_events();
        assert_eq!(events, vec![
            CoreEvent::LogLine(
                "Refresh failed: Device enumeration failed: service unavailable".to_string()
            ),
            CoreEvent::StatusChanged {
                status: TokenStatus::Absent,
                description: "Security key: status error (Device enumeration failed: service unavailable)"
                    .to_string(),
            },
        ]);
    }

    #[tokio::test]
    async fn test_toggle_logs_and_clears_blocks() {
        let runner = Arc::new(ScriptedRunner::new());
        let (mut poller, bridge) = poller(runner);
        poller.apply_control(PollerControl::Block("2-4".to_string()));
        assert!(poller.reconciler().state().is_blocked("2-4"));

        poller.apply_control(PollerControl::SetAutoAttach(false));
        assert!(poller.reconciler().state().is_blocked("2-4"));
        poller.apply_control(PollerControl::SetAutoAttach(true));
        assert!(!poller.reconciler().state().is_blocked("2-4"));

        assert_eq!(bridge.drain_events(), vec![
            CoreEvent::LogLine("Auto-attach known devices disabled.".to_string()),
            CoreEvent::LogLine("Auto-attach known devices enabled.".to_string()),
        ]);
    }

    #[tokio::test]
    async fn test_redundant_enable_keeps_blocks() {
        let runner = Arc::new(ScriptedRunner::new());
        let (mut poller, _bridge) = poller(runner);
        assert!(poller.auto_attach());
        poller.apply_control(PollerControl::Block("2-4".to_string()));

        poller.apply_control(PollerControl::SetAutoAttach(true));
        assert!(poller.reconciler().state().is_blocked("2-4"));
        assert!(poller.auto_attach());
    }
}
