//! A user's progress together with their slot assignment history.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserProgress;
use crate::slots::{Assignment, AssignmentId, AssignmentState, SlotId, UserId, timer};

/// Everything stored for one user. Assignments are append-only; terminal rows
/// stay as exclusion history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub progress: UserProgress,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl UserRecord {
    #[must_use]
    pub const fn new(progress: UserProgress) -> Self {
        Self {
            progress,
            assignments: Vec::new(),
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.progress.id
    }

    /// Non-terminal assignments, in insertion order.
    pub fn visible(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(|a| a.state.is_visible())
    }

    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    /// Every slot this user has ever been given, in any state.
    #[must_use]
    pub fn held_slots(&self) -> HashSet<SlotId> {
        self.assignments.iter().map(|a| a.slot_id).collect()
    }

    /// The non-terminal assignment for `slot_id`, if any.
    pub fn visible_for_slot_mut(&mut self, slot_id: SlotId) -> Option<&mut Assignment> {
        self.assignments
            .iter_mut()
            .find(|a| a.slot_id == slot_id && a.state.is_visible())
    }

    #[must_use]
    pub fn find_for_slot(&self, slot_id: SlotId) -> Option<&Assignment> {
        self.assignments
            .iter()
            .rev()
            .find(|a| a.slot_id == slot_id)
    }

    /// Appends a new assignment row and returns its id.
    pub fn push_assignment(
        &mut self,
        slot_id: SlotId,
        state: AssignmentState,
        now: DateTime<Utc>,
    ) -> AssignmentId {
        let id = self.assignments.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        self.assignments
            .push(Assignment::new(id, self.user_id(), slot_id, state, now));
        id
    }

    /// Recomputes and stores `timer_running`. Returns the new value.
    pub fn refresh_timer(&mut self) -> bool {
        let running = timer::recompute(&self.assignments);
        self.progress.timer_running = running;
        running
    }

    /// Returns true if any subscription is due at `now`.
    #[must_use]
    pub fn has_due(&self, now: DateTime<Utc>) -> bool {
        self.assignments.iter().any(|a| a.is_due(now))
    }

    /// Slot ids of subscriptions due at `now`.
    #[must_use]
    pub fn due_slots(&self, now: DateTime<Utc>) -> Vec<SlotId> {
        self.assignments
            .iter()
            .filter(|a| a.is_due(now))
            .map(|a| a.slot_id)
            .collect()
    }

    /// Drops the whole assignment history. Administrative reset only.
    pub fn clear_assignments(&mut self) -> usize {
        let removed = self.assignments.len();
        self.assignments.clear();
        self.refresh_timer();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> UserRecord {
        UserRecord::new(UserProgress::new(1, 3, Utc::now()))
    }

    #[test]
    fn test_push_assignment_ids_increase() {
        let mut record = record();
        let now = Utc::now();
        assert_eq!(record.push_assignment(10, AssignmentState::Active, now), 1);
        assert_eq!(record.push_assignment(11, AssignmentState::Active, now), 2);
        assert_eq!(record.assignments[1].user_id, 1);
    }

    #[test]
    fn test_visible_excludes_completed() {
        let mut record = record();
        let now = Utc::now();
        record.push_assignment(10, AssignmentState::Completed, now);
        record.push_assignment(11, AssignmentState::Active, now);
        assert_eq!(record.visible_count(), 1);
        assert_eq!(record.held_slots(), HashSet::from([10, 11]));
        assert!(record.visible_for_slot_mut(10).is_none());
        assert!(record.visible_for_slot_mut(11).is_some());
    }

    #[test]
    fn test_clear_assignments_resets_timer() {
        let mut record = record();
        record.push_assignment(10, AssignmentState::Subscribed, Utc::now());
        assert!(record.refresh_timer());
        assert_eq!(record.clear_assignments(), 1);
        assert!(!record.progress.timer_running);
    }
}
