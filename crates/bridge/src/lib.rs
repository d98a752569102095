//! Device reconciliation engine for usb-token-bridge
//!
//! Keeps security tokens exposed by `usbipd` attached to WSL. The poller
//! enumerates devices, the reconciler attaches eligible ones with a fixed
//! retry backoff, and every change reaches the presentation layer as a
//! [`common::CoreEvent`] on one ordered queue.

pub mod config;
pub mod core;
pub mod poller;
pub mod reconcile;
pub mod usbipd;

pub use config::BridgeConfig;
pub use crate::core::{CoreHandle, spawn_core};
pub use poller::{Poller, PollerControl};
pub use reconcile::{AutoAttachState, ReconcileOutcome, Reconciler};
