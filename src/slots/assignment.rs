//! Assignment engine: tops a user's visible slots up to the desired count.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::catalog::SlotCatalog;
use super::model::{AssignmentState, SlotId};
use super::ordering::{SlotRanker, sort_for_user};
use crate::user::UserRecord;

/// Picks up to `limit` slots for the user, best first.
///
/// Candidates are assignable catalog slots the user has never held in any
/// state, minus `exclude`.
#[must_use]
pub fn pick_candidates(
    record: &UserRecord,
    catalog: &SlotCatalog,
    ranker: &dyn SlotRanker,
    limit: usize,
    exclude: Option<SlotId>,
) -> Vec<SlotId> {
    if limit == 0 {
        return Vec::new();
    }

    let held = record.held_slots();
    let mut candidates: Vec<_> = catalog
        .assignable()
        .filter(|slot| !held.contains(&slot.id) && Some(slot.id) != exclude)
        .map(|slot| (slot.category, slot.id))
        .collect();

    sort_for_user(ranker, record.user_id(), &mut candidates, |c| *c);

    candidates.into_iter().take(limit).map(|(_, id)| id).collect()
}

/// Number of slots missing from the user's view.
#[must_use]
pub const fn missing_count(desired: u32, visible: usize) -> usize {
    (desired as usize).saturating_sub(visible)
}

/// Fills the gap between the desired slot count and the visible assignments
/// with new `active` assignments. Returns the slot ids that were added.
///
/// Calling it again without a state change adds nothing.
pub fn ensure_assignments(
    record: &mut UserRecord,
    catalog: &mut SlotCatalog,
    ranker: &dyn SlotRanker,
    now: DateTime<Utc>,
) -> Vec<SlotId> {
    let missing = missing_count(record.progress.current_slot_count, record.visible_count());
    if missing == 0 {
        return Vec::new();
    }

    let picks = pick_candidates(record, catalog, ranker, missing, None);
    for &slot_id in &picks {
        record.push_assignment(slot_id, AssignmentState::Active, now);
        catalog.record_show(slot_id);
    }

    debug!(
        "User {}: {} slot(s) missing, assigned {:?}",
        record.user_id(),
        missing,
        picks
    );
    picks
}

/// Hands out one `need_subscribe` replacement for a just-completed slot.
///
/// Returns `None` when the view is already full or the catalog has nothing
/// left for this user.
pub fn assign_replacement(
    record: &mut UserRecord,
    catalog: &mut SlotCatalog,
    ranker: &dyn SlotRanker,
    completed: SlotId,
    now: DateTime<Utc>,
) -> Option<SlotId> {
    if missing_count(record.progress.current_slot_count, record.visible_count()) == 0 {
        return None;
    }

    let slot_id = pick_candidates(record, catalog, ranker, 1, Some(completed))
        .into_iter()
        .next()?;
    record.push_assignment(slot_id, AssignmentState::NeedSubscribe, now);
    catalog.record_show(slot_id);
    Some(slot_id)
}

/// Returns true if no slot appears twice among the visible assignments.
#[must_use]
pub fn visible_slots_unique(record: &UserRecord) -> bool {
    let mut seen = std::collections::HashSet::new();
    record.visible().all(|a| seen.insert(a.slot_id))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::slots::{NewSlot, Sha256Ranker, SlotCategory};
    use crate::user::UserProgress;

    pub(crate) fn catalog_with(standard: usize, vip: usize) -> SlotCatalog {
        let mut catalog = SlotCatalog::new();
        let now = Utc::now();
        for i in 0..standard {
            catalog
                .insert(NewSlot::new(format!("std-{i}"), format!("@std{i}")), now)
                .unwrap();
        }
        for i in 0..vip {
            catalog
                .insert(
                    NewSlot::new(format!("vip-{i}"), format!("@vip{i}"))
                        .with_category(SlotCategory::Vip),
                    now,
                )
                .unwrap();
        }
        catalog
    }

    fn user(desired: u32) -> UserRecord {
        UserRecord::new(UserProgress::new(4242, desired, Utc::now()))
    }

    #[test]
    fn test_fills_to_desired_with_vip_first() {
        let mut catalog = catalog_with(3, 2);
        let mut record = user(5);

        let picked = ensure_assignments(&mut record, &mut catalog, &Sha256Ranker, Utc::now());

        assert_eq!(picked.len(), 5);
        let categories: Vec<_> = picked
            .iter()
            .map(|id| catalog.get(*id).unwrap().category)
            .collect();
        assert!(categories[..2].iter().all(|c| *c == SlotCategory::Vip));
        assert!(categories[2..].iter().all(|c| *c == SlotCategory::Standard));
        assert!(record.visible().all(|a| a.state == AssignmentState::Active));
    }

    #[test]
    fn test_second_call_is_noop() {
        let mut catalog = catalog_with(8, 0);
        let mut record = user(5);
        let now = Utc::now();

        assert_eq!(ensure_assignments(&mut record, &mut catalog, &Sha256Ranker, now).len(), 5);
        assert!(ensure_assignments(&mut record, &mut catalog, &Sha256Ranker, now).is_empty());
        assert_eq!(record.assignments.len(), 5);
    }

    #[test]
    fn test_short_catalog_assigns_what_exists() {
        let mut catalog = catalog_with(2, 0);
        let mut record = user(5);

        let picked = ensure_assignments(&mut record, &mut catalog, &Sha256Ranker, Utc::now());
        assert_eq!(picked.len(), 2);
        assert!(record.visible_count() <= 5);
    }

    #[test]
    fn test_never_reassigns_completed_or_held_slots() {
        let mut catalog = catalog_with(3, 0);
        let mut record = user(3);
        let now = Utc::now();
        record.push_assignment(1, AssignmentState::Completed, now);
        record.push_assignment(2, AssignmentState::Subscribed, now);

        let picked = ensure_assignments(&mut record, &mut catalog, &Sha256Ranker, now);
        assert_eq!(picked, vec![3]);
        assert!(visible_slots_unique(&record));
    }

    #[test]
    fn test_retired_slots_are_skipped() {
        let mut catalog = catalog_with(3, 0);
        catalog.retire(2);
        let mut record = user(5);

        let picked = ensure_assignments(&mut record, &mut catalog, &Sha256Ranker, Utc::now());
        assert!(!picked.contains(&2));
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_assignment_counts_shows() {
        let mut catalog = catalog_with(1, 0);
        let mut record = user(1);
        ensure_assignments(&mut record, &mut catalog, &Sha256Ranker, Utc::now());
        assert_eq!(catalog.get(1).unwrap().current_shows, 1);
    }

    #[test]
    fn test_replacement_excludes_completed_slot() {
        let mut catalog = catalog_with(3, 0);
        let mut record = user(2);
        let now = Utc::now();
        record.push_assignment(1, AssignmentState::Completed, now);
        record.push_assignment(2, AssignmentState::Subscribed, now);

        let replacement = assign_replacement(&mut record, &mut catalog, &Sha256Ranker, 1, now);
        assert_eq!(replacement, Some(3));
        assert_eq!(
            record.find_for_slot(3).map(|a| a.state),
            Some(AssignmentState::NeedSubscribe)
        );
    }

    #[test]
    fn test_replacement_respects_full_view() {
        let mut catalog = catalog_with(3, 0);
        let mut record = user(1);
        record.push_assignment(2, AssignmentState::Active, Utc::now());

        assert!(assign_replacement(&mut record, &mut catalog, &Sha256Ranker, 1, Utc::now()).is_none());
    }
}
