//! Assignment lifecycle.
//!
//! States only move forward:
//! 1. `active` / `need_subscribe` → `subscribed` on an explicit user action,
//!    starting the grace period (`due_at = now + grace`)
//! 2. `subscribed` → `completed` once `due_at` has passed
//! 3. On completion one `need_subscribe` replacement is handed out
//!
//! Acting on an assignment in any other state is a no-op that reports the
//! current state.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use super::assignment::assign_replacement;
use super::catalog::SlotCatalog;
use super::model::{AssignmentState, SlotId};
use super::ordering::SlotRanker;
use crate::user::UserRecord;

/// Result of a subscribe action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// The assignment moved to `subscribed`; completion is due at `due_at`.
    Subscribed { due_at: DateTime<Utc> },
    /// The assignment was not awaiting a subscription.
    Unchanged(AssignmentState),
    /// The user was never given this slot.
    NotAssigned,
}

impl SubscribeOutcome {
    /// State the assignment is in after the action, if it exists.
    #[must_use]
    pub const fn state(self) -> Option<AssignmentState> {
        match self {
            Self::Subscribed { .. } => Some(AssignmentState::Subscribed),
            Self::Unchanged(state) => Some(state),
            Self::NotAssigned => None,
        }
    }
}

/// Result of a completion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Completed; carries the replacement slot if one was available.
    Completed { replacement: Option<SlotId> },
    /// Still inside the grace period.
    NotDue,
    /// Nothing subscribed for this slot any more.
    Stale,
}

/// Moves the user's assignment for `slot_id` to `subscribed`.
pub fn subscribe(
    record: &mut UserRecord,
    slot_id: SlotId,
    grace: TimeDelta,
    now: DateTime<Utc>,
) -> SubscribeOutcome {
    let user_id = record.user_id();

    let Some(assignment) = record.visible_for_slot_mut(slot_id) else {
        return record
            .find_for_slot(slot_id)
            .map_or(SubscribeOutcome::NotAssigned, |a| {
                SubscribeOutcome::Unchanged(a.state)
            });
    };

    if !assignment.state.awaits_subscription() {
        debug!(
            "User {} slot {}: subscribe ignored in state {}",
            user_id, slot_id, assignment.state
        );
        return SubscribeOutcome::Unchanged(assignment.state);
    }

    let due_at = now + grace;
    assignment.state = AssignmentState::Subscribed;
    assignment.subscribed_at = Some(now);
    assignment.due_at = Some(due_at);

    info!(
        "User {} subscribed to slot {}, completion due at {}",
        user_id, slot_id, due_at
    );
    SubscribeOutcome::Subscribed { due_at }
}

/// Why `slot_id` cannot be completed at `now`, or `None` if it can.
///
/// Needs no catalog access, so callers can skip the catalog lock.
#[must_use]
pub fn blocked_completion(
    record: &UserRecord,
    slot_id: SlotId,
    now: DateTime<Utc>,
) -> Option<CompletionOutcome> {
    match record
        .visible()
        .find(|a| a.slot_id == slot_id && a.state == AssignmentState::Subscribed)
    {
        None => Some(CompletionOutcome::Stale),
        Some(a) if !a.is_due(now) => Some(CompletionOutcome::NotDue),
        Some(_) => None,
    }
}

/// Completes the user's subscription to `slot_id` if its grace period is over,
/// then hands out one replacement.
pub fn complete(
    record: &mut UserRecord,
    catalog: &mut SlotCatalog,
    ranker: &dyn SlotRanker,
    slot_id: SlotId,
    now: DateTime<Utc>,
) -> CompletionOutcome {
    let user_id = record.user_id();

    if let Some(outcome) = blocked_completion(record, slot_id, now) {
        if outcome == CompletionOutcome::Stale {
            debug!("User {} slot {}: nothing to complete", user_id, slot_id);
        }
        return outcome;
    }
    let Some(assignment) = record.visible_for_slot_mut(slot_id) else {
        return CompletionOutcome::Stale;
    };

    assignment.state = AssignmentState::Completed;
    let replacement = assign_replacement(record, catalog, ranker, slot_id, now);

    info!(
        "User {} completed slot {}, replacement: {:?}",
        user_id, slot_id, replacement
    );
    CompletionOutcome::Completed { replacement }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::Sha256Ranker;
    use crate::slots::assignment::ensure_assignments;
    use crate::slots::assignment::tests::catalog_with;
    use crate::user::UserProgress;

    const GRACE: TimeDelta = TimeDelta::seconds(60);

    fn setup(desired: u32, slots: usize) -> (UserRecord, SlotCatalog, DateTime<Utc>) {
        let now = Utc::now();
        let mut catalog = catalog_with(slots, 0);
        let mut record = UserRecord::new(UserProgress::new(99, desired, now));
        ensure_assignments(&mut record, &mut catalog, &Sha256Ranker, now);
        (record, catalog, now)
    }

    #[test]
    fn test_subscribe_sets_due_time() {
        let (mut record, _, now) = setup(2, 2);
        let slot = record.assignments[0].slot_id;

        let outcome = subscribe(&mut record, slot, GRACE, now);

        assert_eq!(outcome, SubscribeOutcome::Subscribed { due_at: now + GRACE });
        let row = record.find_for_slot(slot).unwrap();
        assert_eq!(row.subscribed_at, Some(now));
        assert_eq!(row.state, AssignmentState::Subscribed);
    }

    #[test]
    fn test_subscribe_twice_is_noop() {
        let (mut record, _, now) = setup(2, 2);
        let slot = record.assignments[0].slot_id;

        subscribe(&mut record, slot, GRACE, now);
        let later = now + TimeDelta::seconds(10);
        let again = subscribe(&mut record, slot, GRACE, later);

        assert_eq!(again, SubscribeOutcome::Unchanged(AssignmentState::Subscribed));
        assert_eq!(record.find_for_slot(slot).unwrap().subscribed_at, Some(now));
    }

    #[test]
    fn test_subscribe_unknown_slot() {
        let (mut record, _, now) = setup(1, 1);
        assert_eq!(subscribe(&mut record, 77, GRACE, now), SubscribeOutcome::NotAssigned);
    }

    #[test]
    fn test_completion_waits_for_grace_period() {
        let (mut record, mut catalog, now) = setup(2, 5);
        let slot = record.assignments[0].slot_id;
        subscribe(&mut record, slot, GRACE, now);

        let early = complete(&mut record, &mut catalog, &Sha256Ranker, slot, now + TimeDelta::seconds(59));
        assert_eq!(early, CompletionOutcome::NotDue);
        assert_eq!(record.find_for_slot(slot).unwrap().state, AssignmentState::Subscribed);

        let done = complete(&mut record, &mut catalog, &Sha256Ranker, slot, now + GRACE);
        let CompletionOutcome::Completed { replacement: Some(replacement) } = done else {
            panic!("expected completion with replacement, got {done:?}");
        };
        assert_ne!(replacement, slot);
        assert_eq!(record.find_for_slot(slot).unwrap().state, AssignmentState::Completed);

        let new_rows: Vec<_> = record
            .assignments
            .iter()
            .filter(|a| a.state == AssignmentState::NeedSubscribe)
            .collect();
        assert_eq!(new_rows.len(), 1);
        assert_eq!(new_rows[0].slot_id, replacement);
        assert_eq!(record.visible_count(), 2);
    }

    #[test]
    fn test_double_completion_is_stale() {
        let (mut record, mut catalog, now) = setup(1, 3);
        let slot = record.assignments[0].slot_id;
        subscribe(&mut record, slot, GRACE, now);

        let due = now + GRACE;
        assert!(matches!(
            complete(&mut record, &mut catalog, &Sha256Ranker, slot, due),
            CompletionOutcome::Completed { .. }
        ));
        assert_eq!(
            complete(&mut record, &mut catalog, &Sha256Ranker, slot, due),
            CompletionOutcome::Stale
        );
        assert_eq!(
            record
                .assignments
                .iter()
                .filter(|a| a.state == AssignmentState::NeedSubscribe)
                .count(),
            1
        );
    }

    #[test]
    fn test_complete_missing_assignment_is_stale() {
        let (mut record, mut catalog, now) = setup(1, 1);
        assert_eq!(
            complete(&mut record, &mut catalog, &Sha256Ranker, 500, now),
            CompletionOutcome::Stale
        );
        // Active but never subscribed.
        let slot = record.assignments[0].slot_id;
        assert_eq!(
            complete(&mut record, &mut catalog, &Sha256Ranker, slot, now),
            CompletionOutcome::Stale
        );
    }

    #[test]
    fn test_completion_without_supply_leaves_gap() {
        let (mut record, mut catalog, now) = setup(1, 1);
        let slot = record.assignments[0].slot_id;
        subscribe(&mut record, slot, GRACE, now);

        let outcome = complete(&mut record, &mut catalog, &Sha256Ranker, slot, now + GRACE);
        assert_eq!(outcome, CompletionOutcome::Completed { replacement: None });
        assert_eq!(record.visible_count(), 0);
    }

    #[test]
    fn test_need_subscribe_accepts_subscription() {
        let (mut record, mut catalog, now) = setup(1, 2);
        let slot = record.assignments[0].slot_id;
        subscribe(&mut record, slot, GRACE, now);
        let CompletionOutcome::Completed { replacement: Some(next) } =
            complete(&mut record, &mut catalog, &Sha256Ranker, slot, now + GRACE)
        else {
            panic!("expected a replacement");
        };

        let outcome = subscribe(&mut record, next, GRACE, now + GRACE);
        assert!(matches!(outcome, SubscribeOutcome::Subscribed { .. }));
    }

    #[test]
    fn test_subscribe_completed_slot_reports_state() {
        let (mut record, mut catalog, now) = setup(1, 3);
        let slot = record.assignments[0].slot_id;
        subscribe(&mut record, slot, GRACE, now);
        complete(&mut record, &mut catalog, &Sha256Ranker, slot, now + GRACE);

        let outcome = subscribe(&mut record, slot, GRACE, now + GRACE);
        assert_eq!(outcome, SubscribeOutcome::Unchanged(AssignmentState::Completed));
        assert_eq!(outcome.state(), Some(AssignmentState::Completed));
        assert_eq!(record.find_for_slot(slot).unwrap().state, AssignmentState::Completed);
    }

    #[test]
    fn test_blocked_completion() {
        let (mut record, _, now) = setup(1, 1);
        let slot = record.assignments[0].slot_id;
        assert_eq!(blocked_completion(&record, slot, now), Some(CompletionOutcome::Stale));

        subscribe(&mut record, slot, GRACE, now);
        assert_eq!(blocked_completion(&record, slot, now), Some(CompletionOutcome::NotDue));
        assert_eq!(blocked_completion(&record, slot, now + GRACE), None);
    }
}
