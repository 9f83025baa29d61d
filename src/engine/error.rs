//! Engine errors.

use thiserror::Error;

use crate::slots::{SlotId, SlotRejection, UserId};

/// Errors surfaced by [`super::SlotEngine`].
///
/// Acting on an assignment in the wrong state is not an error: those calls
/// succeed and report the current state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Slot {slot_id} is not assigned to user {user_id}")]
    AssignmentNotFound { user_id: UserId, slot_id: SlotId },

    #[error("Slot {0} not found")]
    SlotNotFound(SlotId),

    #[error("Invalid slot: {0}")]
    InvalidSlot(#[from] SlotRejection),
}

impl EngineError {
    /// Returns true for the not-found family.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_) | Self::AssignmentNotFound { .. } | Self::SlotNotFound(_)
        )
    }
}
