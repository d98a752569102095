//! Protocol library for usb-token-bridge
//!
//! This crate understands the text interface of the host sharing tool
//! (`usbipd`). It turns the enumeration table into [`DeviceRecord`]s,
//! interprets the free-text state column, classifies security tokens and
//! reduces a snapshot into a single [`TokenStatus`]. Everything here is pure:
//! no process spawning, no I/O.
//!
//! # Example
//!
//! ```
//! use protocol::{Allowlist, TokenStatus, aggregate, parse_device_table};
//!
//! let output = "\
//! BUSID  VID:PID    DEVICE                  STATE
//! 2-4    1050:0407  YubiKey OTP+FIDO+CCID   Attached
//! 2-6    046d:c52b  USB Receiver            Not shared
//! ";
//!
//! let snapshot = parse_device_table(output);
//! assert_eq!(snapshot.len(), 2);
//! assert_eq!(snapshot[0].descriptor, "YubiKey OTP+FIDO+CCID");
//!
//! let status = aggregate(&snapshot, &Allowlist::default());
//! assert_eq!(status, TokenStatus::AttachedToGuest);
//! ```

pub mod aggregate;
pub mod classify;
pub mod state;
pub mod table;
pub mod types;

pub use aggregate::aggregate;
pub use classify::{Allowlist, DEFAULT_KEYWORDS, DEFAULT_VIDPID_PREFIXES};
pub use state::{interpret, is_attached};
pub use table::{MIN_ROW_CELLS, parse_device_table, parse_row, split_cells};
pub use types::{DeviceRecord, ShareState, TokenStatus};
