//! Timer-running aggregation.

use super::model::{Assignment, AssignmentState};

/// The progress timer runs only while the user has at least one visible
/// assignment and every visible assignment is subscribed.
#[must_use]
pub fn recompute<'a>(assignments: impl IntoIterator<Item = &'a Assignment>) -> bool {
    let mut any_visible = false;
    for assignment in assignments {
        if !assignment.state.is_visible() {
            continue;
        }
        if assignment.state != AssignmentState::Subscribed {
            return false;
        }
        any_visible = true;
    }
    any_visible
}
