//! Bridge configuration management
//!
//! Defaults are compiled in. The process environment is read once at
//! startup and command-line flags are applied on top. Nothing is persisted.

use anyhow::{Result, anyhow};
use protocol::Allowlist;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_TOOL_PATH: &str = "USBIPD_EXE";
pub const ENV_VIDPID_PREFIXES: &str = "TOKEN_BRIDGE_VIDPID_PREFIXES";
pub const ENV_KEYWORDS: &str = "TOKEN_BRIDGE_KEYWORDS";
pub const ENV_POLL_SECS: &str = "TOKEN_BRIDGE_POLL_SECS";
pub const ENV_RETRY_SECS: &str = "TOKEN_BRIDGE_RETRY_SECS";
pub const ENV_LIST_TIMEOUT_SECS: &str = "TOKEN_BRIDGE_LIST_TIMEOUT_SECS";
pub const ENV_OP_TIMEOUT_SECS: &str = "TOKEN_BRIDGE_OP_TIMEOUT_SECS";
pub const ENV_AUTO_ATTACH: &str = "TOKEN_BRIDGE_AUTO_ATTACH";
pub const ENV_SHOW_ALL: &str = "TOKEN_BRIDGE_SHOW_ALL";
pub const ENV_LOG_LEVEL: &str = "TOKEN_BRIDGE_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeConfig {
    /// Explicit sharing tool location (file or folder)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_path: Option<PathBuf>,
    /// Attach eligible devices automatically
    pub auto_attach: bool,
    /// Show non-token devices in the device list
    pub show_all: bool,
    pub log_level: String,
    pub allowlist: Allowlist,
    pub timing: TimingSettings,
}

/// Poll cadence, retry backoff and external call bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimingSettings {
    pub poll_interval_secs: u64,
    /// Fixed delay before retrying a failed auto-attach
    pub retry_backoff_secs: u64,
    pub list_timeout_secs: u64,
    /// Bound for bind, unbind, attach and detach calls
    pub operation_timeout_secs: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            retry_backoff_secs: 30,
            list_timeout_secs: 20,
            operation_timeout_secs: 30,
        }
    }
}

impl TimingSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tool_path: None,
            auto_attach: true,
            show_all: false,
            log_level: "info".to_string(),
            allowlist: Allowlist::default(),
            timing: TimingSettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    ///
    /// Blank values are ignored. Malformed numbers or booleans are errors.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_TOOL_PATH) {
            self.tool_path = Some(expand_path(&path));
        }
        if let Some(list) = get(ENV_VIDPID_PREFIXES) {
            self.allowlist.vidpid_prefixes = split_list(&list);
        }
        if let Some(list) = get(ENV_KEYWORDS) {
            self.allowlist.keywords = split_list(&list);
        }
        if let Some(v) = get(ENV_POLL_SECS) {
            self.timing.poll_interval_secs = parse_secs(ENV_POLL_SECS, &v)?;
        }
        if let Some(v) = get(ENV_RETRY_SECS) {
            self.timing.retry_backoff_secs = parse_secs(ENV_RETRY_SECS, &v)?;
        }
        if let Some(v) = get(ENV_LIST_TIMEOUT_SECS) {
            self.timing.list_timeout_secs = parse_secs(ENV_LIST_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(ENV_OP_TIMEOUT_SECS) {
            self.timing.operation_timeout_secs = parse_secs(ENV_OP_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(ENV_AUTO_ATTACH) {
            self.auto_attach = parse_bool(ENV_AUTO_ATTACH, &v)?;
        }
        if let Some(v) = get(ENV_SHOW_ALL) {
            self.show_all = parse_bool(ENV_SHOW_ALL, &v)?;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.log_level = level.trim().to_lowercase();
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        let durations = [
            ("poll_interval_secs", self.timing.poll_interval_secs),
            ("retry_backoff_secs", self.timing.retry_backoff_secs),
            ("list_timeout_secs", self.timing.list_timeout_secs),
            ("operation_timeout_secs", self.timing.operation_timeout_secs),
        ];
        for (name, value) in durations {
            if value == 0 {
                return Err(anyhow!("{} must be greater than 0", name));
            }
        }

        if !self.allowlist.is_usable() {
            return Err(anyhow!(
                "Allowlist has no usable entry: set {} or {}",
                ENV_VIDPID_PREFIXES,
                ENV_KEYWORDS
            ));
        }

        Ok(())
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| anyhow!("Failed to serialize configuration: {}", e))
    }
}

/// Expand a leading `~` in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path.trim()).as_ref())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid {} '{}', expected whole seconds", key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("Invalid {} '{}', expected true or false", key, value)),
    }
}
