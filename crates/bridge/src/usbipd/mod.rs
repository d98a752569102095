//! Sharing tool integration
//!
//! Everything that touches the external `usbipd` process lives here:
//! - Executable resolution
//! - The process-backed [`ToolRunner`](common::ToolRunner)
//! - Enumeration into device snapshots
//! - The bind / unbind / attach / detach gateway

pub mod fetch;
pub mod gateway;
pub mod locate;
pub mod runner;

pub use fetch::fetch_snapshot;
pub use gateway::Gateway;
pub use locate::resolve_tool_path;
pub use runner::ProcessRunner;
