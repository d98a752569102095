//! Token status aggregation

use crate::classify::Allowlist;
use crate::state::is_attached;
use crate::types::{DeviceRecord, TokenStatus};

/// Reduce a snapshot to one overall [`TokenStatus`]
///
/// A single attached eligible device is enough to report `AttachedToGuest`,
/// even when other eligible devices are only visible to the host.
pub fn aggregate(snapshot: &[DeviceRecord], allowlist: &Allowlist) -> TokenStatus {
    let mut status = TokenStatus::Absent;

    for record in allowlist.eligible(snapshot) {
        if is_attached(&record.raw_state) {
            return TokenStatus::AttachedToGuest;
        }
        status = TokenStatus::HostOnly;
    }

    status
}
