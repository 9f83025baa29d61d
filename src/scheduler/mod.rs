//! Background completion of subscriptions.
//!
//! Completes subscriptions once their grace period has elapsed, driven by
//! the `due_at` stored on each assignment.

mod runner;

pub use runner::{CompletionSweeper, SweepReport, SweeperMessage};
