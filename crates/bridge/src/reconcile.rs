//! Auto-attach reconciler
//!
//! Each poll cycle the reconciler walks the snapshot in tool order and tries
//! to attach every eligible device that is not yet attached to the guest,
//! unless the device is blocked or still waiting out its retry backoff.
//!
//! The state here has a single owner, the poller task. Other tasks change it
//! only through poller control messages.

use crate::usbipd::Gateway;
use common::ToolRunner;
use protocol::{Allowlist, DeviceRecord, ShareState};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Per-device retry deadlines and the blocked set
///
/// A busid is never both blocked and waiting for a retry.
#[derive(Debug, Default, Clone)]
pub struct AutoAttachState {
    retry_at: HashMap<String, Instant>,
    blocked: HashSet<String>,
}

impl AutoAttachState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blocked(&self, busid: &str) -> bool {
        self.blocked.contains(busid)
    }

    pub fn retry_at(&self, busid: &str) -> Option<Instant> {
        self.retry_at.get(busid).copied()
    }

    /// Whether a retry deadline for `busid` is still ahead of `now`
    pub fn is_waiting(&self, busid: &str, now: Instant) -> bool {
        self.retry_at(busid).is_some_and(|at| at > now)
    }

    /// Exclude a device from auto-attach (after a user unbind or detach)
    pub fn block(&mut self, busid: &str) {
        self.retry_at.remove(busid);
        self.blocked.insert(busid.to_string());
    }

    /// Re-enable auto-attach for every device; retry deadlines stay
    pub fn clear_blocks(&mut self) {
        self.blocked.clear();
    }

    /// A user attach succeeded: forget the block and the retry deadline
    pub fn record_manual_attach(&mut self, busid: &str) {
        self.blocked.remove(busid);
        self.retry_at.remove(busid);
    }

    pub fn blocked(&self) -> impl Iterator<Item = &str> {
        self.blocked.iter().map(String::as_str)
    }

    fn schedule_retry(&mut self, busid: &str, at: Instant) {
        self.retry_at.insert(busid.to_string(), at);
    }

    fn clear_retry(&mut self, busid: &str) {
        self.retry_at.remove(busid);
    }
}

/// What one reconcile pass did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// At least one attach succeeded, so the snapshot is stale
    pub changed: bool,
    /// Operator-facing lines, one per attempt
    pub logs: Vec<String>,
    /// Busids an attach was attempted for, in order
    pub attempts: Vec<String>,
}

/// Auto-attach state machine
#[derive(Debug, Clone)]
pub struct Reconciler {
    allowlist: Allowlist,
    backoff: Duration,
    state: AutoAttachState,
}

impl Reconciler {
    /// Create a reconciler with a fixed retry backoff
    pub fn new(allowlist: Allowlist, backoff: Duration) -> Self {
        Self {
            allowlist,
            backoff,
            state: AutoAttachState::new(),
        }
    }

    pub fn state(&self) -> &AutoAttachState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AutoAttachState {
        &mut self.state
    }

    /// Whether a record would be attempted at `now`
    pub fn is_candidate(&self, record: &DeviceRecord, now: Instant) -> bool {
        let busid = record.busid.trim();
        !busid.is_empty()
            && self.allowlist.is_eligible(record)
            && record.share_state() != ShareState::AttachedToGuest
            && !self.state.is_blocked(busid)
            && !self.state.is_waiting(busid, now)
    }

    /// Run one pass over the snapshot
    ///
    /// Every check happens before any external call. A failure schedules a
    /// retry at `now + backoff` and never blocks the device; it also never
    /// stops the pass from reaching later devices.
    pub async fn reconcile<R: ToolRunner>(
        &mut self,
        snapshot: &[DeviceRecord],
        now: Instant,
        gateway: &Gateway<R>,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for record in snapshot {
            if !self.is_candidate(record, now) {
                continue;
            }
            let busid = record.busid.trim();
            outcome.attempts.push(busid.to_string());

            match gateway.attach(busid).await {
                Ok(_) => {
                    info!("Auto-attached {}", busid);
                    self.state.clear_retry(busid);
                    outcome.changed = true;
                    outcome.logs.push(format!("Auto-attach OK: {}.", busid));
                }
                Err(e) => {
                    warn!("Auto-attach failed for {}: {}", busid, e);
                    self.state.schedule_retry(busid, now + self.backoff);
                    outcome.logs.push(format!("Auto-attach failed for {}: {}", busid, e));
                }
            }
        }

        outcome
    }
}
