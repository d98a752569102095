//! usb-token-bridge
//!
//! Keeps USB security tokens shared by usbipd-win attached to WSL, and shows
//! their status in a terminal UI or logs it in headless mode.

mod service;
mod tui;
mod wsl;

use anyhow::{Context, Result};
use bridge::usbipd::{ProcessRunner, fetch_snapshot, resolve_tool_path};
use bridge::{BridgeConfig, spawn_core};
use clap::Parser;
use common::{LogTarget, create_core_bridge, setup_logging};
use protocol::aggregate;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "token-bridge")]
#[command(
    author,
    version,
    about = "USB Token Bridge - Keep security keys attached to WSL"
)]
#[command(long_about = "
Watches the USB devices exposed by usbipd-win, recognises security tokens
(YubiKey and other FIDO keys) and keeps them attached to WSL. Failed
attaches are retried after a fixed backoff; devices you unbind or detach
yourself are left alone until auto-attach is re-enabled.

EXAMPLES:
    # Interactive terminal UI
    token-bridge

    # Headless, logging to stdout
    token-bridge --service

    # One-shot listing of every device as JSON
    token-bridge --list-devices --all --json

    # Use a specific usbipd executable
    token-bridge --usbipd 'C:\\Program Files\\usbipd-win\\usbipd.exe'

ENVIRONMENT:
    USBIPD_EXE                      usbipd executable or its folder
    TOKEN_BRIDGE_VIDPID_PREFIXES    comma-separated VID:PID prefixes (default 1050:)
    TOKEN_BRIDGE_KEYWORDS           comma-separated descriptor keywords
    TOKEN_BRIDGE_POLL_SECS          poll interval (default 3)
    TOKEN_BRIDGE_RETRY_SECS         auto-attach retry backoff (default 30)
    TOKEN_BRIDGE_LIST_TIMEOUT_SECS  usbipd list timeout (default 20)
    TOKEN_BRIDGE_OP_TIMEOUT_SECS    bind/attach/detach timeout (default 30)
    TOKEN_BRIDGE_AUTO_ATTACH        true/false (default true)
    TOKEN_BRIDGE_SHOW_ALL           true/false (default false)
    TOKEN_BRIDGE_LOG_LEVEL          trace, debug, info, warn, error

In TUI mode diagnostics go to stderr; redirect it (2> bridge.log) to keep
the screen clean.
")]
struct Args {
    /// Run headless (no TUI)
    #[arg(long)]
    service: bool,

    /// List devices once and exit
    #[arg(long)]
    list_devices: bool,

    /// With --list-devices, include devices that are not security tokens
    #[arg(long, requires = "list_devices")]
    all: bool,

    /// With --list-devices, print JSON
    #[arg(long, requires = "list_devices")]
    json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    show_config: bool,

    /// Start with every device visible, not only security tokens
    #[arg(long)]
    show_all: bool,

    /// Start with auto-attach disabled
    #[arg(long)]
    no_auto_attach: bool,

    /// usbipd executable or the folder containing it
    #[arg(long, value_name = "PATH")]
    usbipd: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Args {
    /// Apply command-line overrides on top of the environment
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(path) = &self.usbipd {
            config.tool_path = Some(bridge::config::expand_path(path));
        }
        if self.show_all {
            config.show_all = true;
        }
        if self.no_auto_attach {
            config.auto_attach = false;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.to_lowercase();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BridgeConfig::from_env().context("Failed to read environment")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if args.show_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let target = if args.service || args.list_devices {
        LogTarget::Stdout
    } else {
        LogTarget::Stderr
    };
    setup_logging(&config.log_level, target).context("Failed to setup logging")?;

    info!("usb-token-bridge v{}", env!("CARGO_PKG_VERSION"));

    let tool_path = resolve_tool_path(config.tool_path.as_deref());
    info!("Using usbipd at {}", tool_path.display());
    let runner = Arc::new(ProcessRunner::new(tool_path));

    if args.list_devices {
        return list_devices_mode(&config, &runner, args.all, args.json).await;
    }

    let (ui_bridge, endpoint) = create_core_bridge();
    let core = spawn_core(&config, runner, endpoint);

    let result = if args.service {
        info!("Running in service mode (headless)");
        service::run(ui_bridge).await
    } else {
        tui::run(ui_bridge, &config).await
    };

    core.join().await;
    info!("Shutdown complete");
    result
}

/// List devices once and exit
async fn list_devices_mode(
    config: &BridgeConfig,
    runner: &ProcessRunner,
    all: bool,
    json: bool,
) -> Result<()> {
    let snapshot = fetch_snapshot(runner, config.timing.list_timeout())
        .await
        .context("Failed to list devices")?;

    let status = aggregate(&snapshot, &config.allowlist);
    let devices: Vec<_> = snapshot
        .iter()
        .filter(|d| all || config.allowlist.is_eligible(d))
        .collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&devices).context("Failed to serialize devices")?
        );
        return Ok(());
    }

    println!("{}", status.description());
    if devices.is_empty() {
        println!("No matching USB devices found.");
    } else {
        println!("Found {} of {} USB device(s):\n", devices.len(), snapshot.len());
        for device in devices {
            println!(
                "  {:<8} {:<10} {:<45} {}",
                device.busid, device.vidpid, device.descriptor, device.raw_state
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_cli_overrides_environment() {
        let args = Args::parse_from([
            "token-bridge",
            "--no-auto-attach",
            "--show-all",
            "--log-level",
            "DEBUG",
            "--usbipd",
            "/opt/usbipd",
        ]);
        let mut config = BridgeConfig::default();
        args.apply(&mut config);

        assert!(!config.auto_attach);
        assert!(config.show_all);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.tool_path, Some(PathBuf::from("/opt/usbipd")));
    }

    #[test]
    fn test_list_flags_require_list_devices() {
        assert!(Args::try_parse_from(["token-bridge", "--json"]).is_err());
        assert!(Args::try_parse_from(["token-bridge", "--list-devices", "--all", "--json"]).is_ok());
    }
}
