//! Guest shell launcher
//!
//! Opens the default WSL distribution as root in its own console window.
//! The shell outlives the bridge; nothing waits on it except a reaper task.

use std::io;
use tokio::process::Command;
use tracing::debug;

/// Launcher program for the guest environment
pub const WSL_PROGRAM: &str = "wsl.exe";

/// Arguments selecting the root user
pub const ROOT_ARGS: &[&str] = &["-u", "root"];

/// Log line after a successful launch
pub const OPENED_MESSAGE: &str = "Opened WSL as root (wsl.exe -u root).";

/// Error dialog title when the launch fails
pub const FAILED_TITLE: &str = "Failed to open WSL";

#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

/// Open a root shell in the default distribution
pub fn open_root_shell() -> io::Result<()> {
    spawn_detached(WSL_PROGRAM, ROOT_ARGS)
}

/// Start `program` in a new console and return once it is running
pub fn spawn_detached(program: &str, args: &[&str]) -> io::Result<()> {
    let mut cmd = Command::new(program);
    cmd.args(args);

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NEW_CONSOLE);

    let mut child = cmd.spawn()?;
    let label = format!("{} {}", program, args.join(" "));
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!("`{}` exited with {}", label, status),
            Err(e) => debug!("Failed to wait for `{}`: {}", label, e),
        }
    });
    Ok(())
}
