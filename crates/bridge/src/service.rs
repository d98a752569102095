//! Headless service mode
//!
//! Forwards core events to the log until Ctrl+C, then shuts the core down.

use anyhow::{Context, Result};
use common::{CoreCommand, CoreEvent, UiBridge};
use tokio::signal;
use tracing::{error, info, warn};

/// Drain core events into the log until Ctrl+C or the core stops
pub async fn run(bridge: UiBridge) -> Result<()> {
    info!("Press Ctrl+C to shutdown");

    loop {
        tokio::select! {
            event = bridge.recv_event() => match event {
                Ok(event) => log_event(&event),
                Err(_) => {
                    warn!("Core event queue closed");
                    return Ok(());
                }
            },
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }
        }
    }

    bridge
        .send_command(CoreCommand::Shutdown)
        .await
        .context("Failed to send Shutdown command")?;

    // Flush what the core queued before it stopped
    for event in bridge.drain_events() {
        log_event(&event);
    }
    Ok(())
}

fn log_event(event: &CoreEvent) {
    match event {
        CoreEvent::StatusChanged { description, .. } => info!("{}", description),
        CoreEvent::LogLine(line) => info!("{}", line),
        CoreEvent::SnapshotUpdated {
            devices,
            total,
            show_all,
        } => {
            if *show_all {
                info!("Showing ALL devices: {}/{}.", devices.len(), total);
            } else {
                info!(
                    "Showing acceptable devices: {}/{}. Hidden: {}.",
                    devices.len(),
                    total,
                    total.saturating_sub(devices.len())
                );
            }
            for device in devices {
                info!(
                    "  {:<8} {:<10} {} [{}]",
                    device.busid, device.vidpid, device.descriptor, device.raw_state
                );
            }
        }
        CoreEvent::OperationResult { title, outcome } => match outcome {
            Ok(detail) => info!("{}: {}", title, detail),
            Err(e) => error!("{}: {}", title, e),
        },
    }
}
