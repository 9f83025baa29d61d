//! Advertising slot rotation.
//!
//! Assigns catalog slots to users in a deterministic per-user order, drives
//! each assignment through its subscription lifecycle and derives whether the
//! user's progress timer may run.

pub mod assignment;
mod catalog;
pub mod lifecycle;
mod model;
pub mod ordering;
pub mod timer;
mod view;

pub use catalog::SlotCatalog;
pub use lifecycle::{CompletionOutcome, SubscribeOutcome};
pub use model::{
    Assignment, AssignmentId, AssignmentState, NewSlot, Slot, SlotCategory, SlotId,
    SlotRejection, SlotStatus, UserId,
};
pub use ordering::{Sha256Ranker, SlotRanker};
pub use view::{SlotView, ViewStatus, build_view};

/// Slots shown to a new user.
pub const DEFAULT_SLOT_COUNT: u32 = 5;

/// Delay between a subscribe action and its automatic completion, in seconds.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 60;
