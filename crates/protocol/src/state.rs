//! State column interpreter
//!
//! The sharing tool reports state as free text ("Not shared", "Shared",
//! "Shared (forced)", "Attached", "Not attached", "Attached - Ubuntu").
//! The grammar, applied to the trimmed lowercased text in order:
//!
//! | contains         | result            |
//! |------------------|-------------------|
//! | `not attached`   | `SharedWithHost`  |
//! | `attached`       | `AttachedToGuest` |
//! | `not shared`     | `NotShared`       |
//! | `shared`         | `SharedWithHost`  |
//! | anything else    | `NotShared`       |
//!
//! "not attached" must be checked first since it contains "attached".

use crate::types::ShareState;

/// Map a free-text state column to a [`ShareState`]
pub fn interpret(raw_state: &str) -> ShareState {
    let state = raw_state.trim().to_lowercase();

    if state.contains("not attached") {
        ShareState::SharedWithHost
    } else if state.contains("attached") {
        ShareState::AttachedToGuest
    } else if state.contains("not shared") {
        ShareState::NotShared
    } else if state.contains("shared") {
        ShareState::SharedWithHost
    } else {
        ShareState::NotShared
    }
}

/// Whether the state column reports the device as attached to the guest
pub fn is_attached(raw_state: &str) -> bool {
    interpret(raw_state) == ShareState::AttachedToGuest
}
