//! Command dispatcher and core task wiring
//!
//! [`spawn_core`] starts two long-lived tasks: the poller and the dispatcher
//! that turns [`CoreCommand`]s into poller control messages or one-shot
//! operation workers.

use crate::config::BridgeConfig;
use crate::poller::{Poller, PollerControl};
use crate::usbipd::Gateway;
use common::{CoreCommand, CoreEndpoint, CoreEvent, EventSender, OperationStage, ToolRunner};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Log line for an operation requested without a device
pub const NO_SELECTION: &str = "Select a USB device first.";

/// Handles to the running core tasks
pub struct CoreHandle {
    poller: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl CoreHandle {
    /// Wait for both tasks to finish (after `CoreCommand::Shutdown`)
    pub async fn join(self) {
        if let Err(e) = self.dispatcher.await {
            warn!("Dispatcher task failed: {}", e);
        }
        if let Err(e) = self.poller.await {
            warn!("Poller task failed: {}", e);
        }
    }
}

/// Start the poller and the command dispatcher
pub fn spawn_core<R: ToolRunner>(
    config: &BridgeConfig,
    runner: Arc<R>,
    endpoint: CoreEndpoint,
) -> CoreHandle {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = watch::channel(false);

    let gateway = Gateway::new(Arc::clone(&runner), config.timing.operation_timeout());
    let poller = Poller::new(config, runner, endpoint.events());

    let poller = tokio::spawn(poller.run(control_rx, stop_rx));
    let dispatcher = tokio::spawn(dispatch(endpoint, gateway, control_tx, stop_tx));

    CoreHandle { poller, dispatcher }
}

async fn dispatch<R: ToolRunner>(
    endpoint: CoreEndpoint,
    gateway: Gateway<R>,
    control: mpsc::UnboundedSender<PollerControl>,
    stop: watch::Sender<bool>,
) {
    let events = endpoint.events();

    while let Ok(cmd) = endpoint.recv_command().await {
        debug!("Core command: {:?}", cmd);
        let to_poller = match cmd {
            CoreCommand::Refresh => {
                let _ = events.log("Refreshing device list...");
                Some(PollerControl::Refresh)
            }
            CoreCommand::SetAutoAttach(enabled) => Some(PollerControl::SetAutoAttach(enabled)),
            CoreCommand::SetShowAll(show_all) => Some(PollerControl::SetShowAll(show_all)),
            CoreCommand::Bind(busid) => {
                spawn_operation(OperationStage::Bind, busid, &gateway, &events, &control);
                None
            }
            CoreCommand::Unbind(busid) => {
                spawn_operation(OperationStage::Unbind, busid, &gateway, &events, &control);
                None
            }
            CoreCommand::Attach(busid) => {
                spawn_operation(OperationStage::Attach, busid, &gateway, &events, &control);
                None
            }
            CoreCommand::Detach(busid) => {
                spawn_operation(OperationStage::Detach, busid, &gateway, &events, &control);
                None
            }
            CoreCommand::Shutdown => break,
        };

        if let Some(msg) = to_poller {
            if control.send(msg).is_err() {
                warn!("Poller is gone, stopping dispatcher");
                break;
            }
        }
    }

    info!("Dispatcher stopped");
    let _ = stop.send(true);
}

/// Run one device operation on its own task
///
/// The result is posted as an [`CoreEvent::OperationResult`]. On success the
/// poller is told to update its auto-attach state and refresh.
fn spawn_operation<R: ToolRunner>(
    stage: OperationStage,
    busid: String,
    gateway: &Gateway<R>,
    events: &EventSender,
    control: &mpsc::UnboundedSender<PollerControl>,
) -> Option<JoinHandle<()>> {
    let busid = busid.trim().to_string();
    if busid.is_empty() {
        let _ = events.log(NO_SELECTION);
        return None;
    }

    let _ = events.log(start_message(stage, &busid));

    let gateway = gateway.clone();
    let events = events.clone();
    let control = control.clone();

    Some(tokio::spawn(async move {
        let result = match stage {
            OperationStage::Bind => gateway.bind(&busid).await,
            OperationStage::Unbind => gateway.unbind(&busid).await,
            OperationStage::Attach => gateway.attach(&busid).await,
            OperationStage::Detach => gateway.detach(&busid).await,
        };

        let (event, follow_up) = match result {
            Ok(detail) => {
                info!("{} succeeded for {}", stage, busid);
                let follow_up = match stage {
                    OperationStage::Unbind | OperationStage::Detach => {
                        vec![PollerControl::Block(busid.clone()), PollerControl::Refresh]
                    }
                    OperationStage::Attach => vec![
                        PollerControl::ManualAttachSucceeded(busid.clone()),
                        PollerControl::Refresh,
                    ],
                    OperationStage::Bind => vec![PollerControl::Refresh],
                };
                let event = CoreEvent::OperationResult {
                    title: success_title(stage, &busid),
                    outcome: Ok(detail),
                };
                (event, follow_up)
            }
            Err(e) => {
                warn!("{} failed for {}: {}", stage, busid, e);
                let event = CoreEvent::OperationResult {
                    title: failure_title(stage).to_string(),
                    outcome: Err(e.to_string()),
                };
                (event, Vec::new())
            }
        };

        // The result precedes the refresh it triggers
        if let Err(e) = events.send(event) {
            debug!("Dropping operation result: {}", e);
        }
        for msg in follow_up {
            let _ = control.send(msg);
        }
    }))
}

fn start_message(stage: OperationStage, busid: &str) -> String {
    match stage {
        OperationStage::Bind => format!("Enabling sharing for {} (bind)...", busid),
        OperationStage::Unbind => format!("Disabling sharing for {} (unbind)...", busid),
        OperationStage::Attach => format!("Attaching {} to WSL (bind + attach)...", busid),
        OperationStage::Detach => format!("Detaching {} from WSL...", busid),
    }
}

fn success_title(stage: OperationStage, busid: &str) -> String {
    match stage {
        OperationStage::Bind => format!("Sharing enabled for {}", busid),
        OperationStage::Unbind => format!("Sharing disabled for {}", busid),
        OperationStage::Attach => format!("Attach OK: {}", busid),
        OperationStage::Detach => format!("Detach OK: {}", busid),
    }
}

fn failure_title(stage: OperationStage) -> &'static str {
    match stage {
        OperationStage::Bind => "Enable sharing failed",
        OperationStage::Unbind => "Disable sharing failed",
        OperationStage::Attach => "Attach failed",
        OperationStage::Detach => "Detach failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles() {
        assert_eq!(success_title(OperationStage::Bind, "1-1"), "Sharing enabled for 1-1");
        assert_eq!(success_title(OperationStage::Detach, "1-1"), "Detach OK: 1-1");
        assert_eq!(failure_title(OperationStage::Unbind), "Disable sharing failed");
        assert_eq!(
            start_message(OperationStage::Attach, "2-4"),
            "Attaching 2-4 to WSL (bind + attach)..."
        );
    }
}
