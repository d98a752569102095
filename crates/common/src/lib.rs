//! Common utilities for usb-token-bridge
//!
//! This crate provides functionality shared by the bridge core and its
//! front-ends: error handling, logging setup, the seam for running the
//! sharing tool, and the async channel bridge between the reconciliation
//! core and the presentation layer.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;
pub mod tool;

pub use channel::{
    CoreCommand, CoreEndpoint, CoreEvent, EventSender, UiBridge, create_core_bridge,
};
pub use error::{Error, OperationStage, Result};
pub use logging::{LogTarget, setup_logging};
pub use tool::{ToolOutput, ToolRunner};
