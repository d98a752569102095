//! Async channel bridge between the reconciliation core and the presentation layer
//!
//! Commands flow from the presentation layer into the core over a bounded
//! channel. Events flow back over a single unbounded, ordered queue with
//! exactly one consumer: [`UiBridge`] is deliberately not `Clone`.

use async_channel::{Receiver, Sender, bounded, unbounded};
use protocol::{DeviceRecord, TokenStatus};

/// Commands from the presentation layer to the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Run a poll cycle now and publish the device list
    Refresh,
    /// Enable sharing for a device
    Bind(String),
    /// Disable sharing for a device (blocks auto-attach for it)
    Unbind(String),
    /// Bind and attach a device to the guest
    Attach(String),
    /// Detach a device from the guest (blocks auto-attach for it)
    Detach(String),
    /// Turn auto-attach on or off
    SetAutoAttach(bool),
    /// Show every device instead of security tokens only
    SetShowAll(bool),
    /// Stop the poller and the command dispatcher
    Shutdown,
}

/// Events from the core to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Overall token status or its description changed
    StatusChanged {
        status: TokenStatus,
        description: String,
    },

    /// Operator-facing log line
    LogLine(String),

    /// Visible device list
    SnapshotUpdated {
        /// Visible records in tool order
        devices: Vec<DeviceRecord>,
        /// Number of devices in the full snapshot
        total: usize,
        /// Whether non-token devices are visible
        show_all: bool,
    },

    /// Outcome of a user-issued device operation
    OperationResult {
        title: String,
        /// Tool output on success, error text on failure
        outcome: Result<String, String>,
    },
}

impl CoreEvent {
    /// Number of devices hidden by the token filter
    pub fn hidden_count(&self) -> Option<usize> {
        match self {
            CoreEvent::SnapshotUpdated { devices, total, .. } => {
                Some(total.saturating_sub(devices.len()))
            }
            _ => None,
        }
    }
}

/// Cloneable sender used by the poller and one-shot workers
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<CoreEvent>,
}

impl EventSender {
    /// Queue an event; fails only when the consumer is gone
    pub fn send(&self, event: CoreEvent) -> crate::Result<()> {
        self.tx
            .try_send(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Queue a log line
    pub fn log(&self, line: impl Into<String>) -> crate::Result<()> {
        self.send(CoreEvent::LogLine(line.into()))
    }

    /// Whether the consumer has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle for the presentation layer (single consumer)
pub struct UiBridge {
    cmd_tx: Sender<CoreCommand>,
    event_rx: Receiver<CoreEvent>,
}

impl UiBridge {
    /// Send a command to the core
    pub async fn send_command(&self, cmd: CoreCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Cloneable command sender, e.g. for a Ctrl+C handler
    pub fn command_sender(&self) -> Sender<CoreCommand> {
        self.cmd_tx.clone()
    }

    /// Receive the next event
    pub async fn recv_event(&self) -> crate::Result<CoreEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Drain every event queued so far, in order
    pub fn drain_events(&self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Handle for the core side
pub struct CoreEndpoint {
    cmd_rx: Receiver<CoreCommand>,
    events: EventSender,
}

impl CoreEndpoint {
    /// Receive the next command; fails once every sender is dropped
    pub async fn recv_command(&self) -> crate::Result<CoreCommand> {
        self.cmd_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Event sender to hand to the poller and workers
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }
}

/// Create the channel bridge between the presentation layer and the core
///
/// Returns (UiBridge for the presentation layer, CoreEndpoint for the core)
pub fn create_core_bridge() -> (UiBridge, CoreEndpoint) {
    let (cmd_tx, cmd_rx) = bounded(64);
    let (event_tx, event_rx) = unbounded();

    (
        UiBridge { cmd_tx, event_rx },
        CoreEndpoint {
            cmd_rx,
            events: EventSender { tx: event_tx },
        },
    )
}
