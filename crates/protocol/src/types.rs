//! Device and status type definitions
//!
//! This module defines the records produced by one enumeration of the sharing
//! tool and the small status enumerations derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the sharing tool's device table
///
/// Records are produced fresh by every enumeration and never mutated.
/// `busid` is unique within one snapshot, and the order of a snapshot is
/// the order in which the tool printed the rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Bus identifier used to address the device (e.g. "2-4")
    pub busid: String,
    /// Vendor and product identifier as printed by the tool (e.g. "1050:0407")
    pub vidpid: String,
    /// Human-readable device descriptor, may contain single spaces
    pub descriptor: String,
    /// Free-text state column (e.g. "Not shared", "Shared", "Attached")
    pub raw_state: String,
}

impl DeviceRecord {
    /// Create a record from its four columns
    pub fn new(
        busid: impl Into<String>,
        vidpid: impl Into<String>,
        descriptor: impl Into<String>,
        raw_state: impl Into<String>,
    ) -> Self {
        Self {
            busid: busid.into(),
            vidpid: vidpid.into(),
            descriptor: descriptor.into(),
            raw_state: raw_state.into(),
        }
    }

    /// Interpret the free-text state column
    pub fn share_state(&self) -> ShareState {
        crate::state::interpret(&self.raw_state)
    }
}

/// Host-side sharing state of a single device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareState {
    /// Device is only visible to the host
    NotShared,
    /// Device is bound for sharing but not attached to the guest
    SharedWithHost,
    /// Device is attached to the guest environment
    AttachedToGuest,
}

impl fmt::Display for ShareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareState::NotShared => write!(f, "not shared"),
            ShareState::SharedWithHost => write!(f, "shared"),
            ShareState::AttachedToGuest => write!(f, "attached"),
        }
    }
}

/// Overall security token status for one poll cycle
///
/// Ordered by priority: `AttachedToGuest` > `HostOnly` > `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TokenStatus {
    /// No eligible device is present
    Absent,
    /// At least one eligible device is present, none attached to the guest
    HostOnly,
    /// At least one eligible device is attached to the guest
    AttachedToGuest,
}

impl TokenStatus {
    /// Operator-facing description of this status
    pub fn description(&self) -> &'static str {
        match self {
            TokenStatus::Absent => "Security key: not detected on host",
            TokenStatus::HostOnly => "Security key: detected on host (not attached to WSL)",
            TokenStatus::AttachedToGuest => "Security key: attached to WSL",
        }
    }

    /// Description used when the device list could not be fetched
    pub fn degraded_description(error: &str) -> String {
        format!("Security key: status error ({})", error)
    }

    /// Short label for a status chip
    pub fn label(&self) -> &'static str {
        match self {
            TokenStatus::Absent => "Token not detected",
            TokenStatus::HostOnly => "Token on host",
            TokenStatus::AttachedToGuest => "Token attached to WSL",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_share_state() {
        let record = DeviceRecord::new("2-4", "1050:0407", "YubiKey OTP+FIDO+CCID", "Attached");
        assert_eq!(record.share_state(), ShareState::AttachedToGuest);
    }

    #[test]
    fn test_token_status_priority_order() {
        assert!(TokenStatus::AttachedToGuest > TokenStatus::HostOnly);
        assert!(TokenStatus::HostOnly > TokenStatus::Absent);
    }

    #[test]
    fn test_degraded_description() {
        let desc = TokenStatus::degraded_description("usbipd list failed");
        assert_eq!(desc, "Security key: status error (usbipd list failed)");
    }
}
