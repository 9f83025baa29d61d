//! UI-facing slot list.

use serde::{Deserialize, Serialize};

use super::catalog::SlotCatalog;
use super::model::{AssignmentState, SlotCategory, SlotId};
use super::ordering::{SlotRanker, sort_for_user};
use crate::user::UserRecord;

/// Status shown for one slot card.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Active,
    Subscribed,
    NeedSubscribe,
    /// Placeholder: the catalog had nothing left to fill this card.
    Empty,
}

impl From<AssignmentState> for ViewStatus {
    fn from(state: AssignmentState) -> Self {
        match state {
            AssignmentState::Active => Self::Active,
            AssignmentState::Subscribed => Self::Subscribed,
            AssignmentState::NeedSubscribe => Self::NeedSubscribe,
            // Terminal rows are never rendered.
            AssignmentState::Completed => Self::Empty,
        }
    }
}

/// One card in the user's slot list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotView {
    pub slot_id: Option<SlotId>,
    pub category: Option<SlotCategory>,
    pub link: String,
    pub display_name: String,
    pub status: ViewStatus,
}

impl SlotView {
    #[must_use]
    pub const fn placeholder() -> Self {
        Self {
            slot_id: None,
            category: None,
            link: String::new(),
            display_name: String::new(),
            status: ViewStatus::Empty,
        }
    }

    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        self.slot_id.is_none()
    }
}

/// Builds the user's list: visible assignments in display order, padded with
/// placeholders up to the desired slot count.
#[must_use]
pub fn build_view(record: &UserRecord, catalog: &SlotCatalog, ranker: &dyn SlotRanker) -> Vec<SlotView> {
    let mut cards: Vec<SlotView> = record
        .visible()
        .map(|assignment| {
            let slot = catalog.get(assignment.slot_id);
            SlotView {
                slot_id: Some(assignment.slot_id),
                category: Some(slot.map_or(SlotCategory::Standard, |s| s.category)),
                link: slot.map(|s| s.link.clone()).unwrap_or_default(),
                display_name: slot.map(|s| s.display_name.clone()).unwrap_or_default(),
                status: assignment.state.into(),
            }
        })
        .collect();

    sort_for_user(ranker, record.user_id(), &mut cards, |card| {
        (card.category.unwrap_or_default(), card.slot_id.unwrap_or_default())
    });

    let desired = record.progress.current_slot_count as usize;
    if cards.len() < desired {
        cards.resize_with(desired, SlotView::placeholder);
    }
    cards
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::slots::Sha256Ranker;
    use crate::slots::assignment::ensure_assignments;
    use crate::slots::assignment::tests::catalog_with;
    use crate::user::UserProgress;

    fn assigned(standard: usize, vip: usize, desired: u32) -> (UserRecord, SlotCatalog) {
        let mut catalog = catalog_with(standard, vip);
        let mut record = UserRecord::new(UserProgress::new(31337, desired, Utc::now()));
        ensure_assignments(&mut record, &mut catalog, &Sha256Ranker, Utc::now());
        (record, catalog)
    }

    #[test]
    fn test_full_catalog_has_no_placeholders() {
        let (record, catalog) = assigned(3, 2, 5);
        let view = build_view(&record, &catalog, &Sha256Ranker);

        assert_eq!(view.len(), 5);
        assert!(view.iter().all(|card| !card.is_placeholder()));
        assert!(view[..2].iter().all(|c| c.category == Some(SlotCategory::Vip)));
        assert!(view[2..].iter().all(|c| c.category == Some(SlotCategory::Standard)));
    }

    #[test]
    fn test_short_catalog_is_padded() {
        let (record, catalog) = assigned(2, 0, 5);
        let view = build_view(&record, &catalog, &Sha256Ranker);

        assert_eq!(view.len(), 5);
        assert_eq!(view.iter().filter(|c| !c.is_placeholder()).count(), 2);
        assert!(view[2..].iter().all(|c| c.status == ViewStatus::Empty));
    }

    #[test]
    fn test_empty_catalog_is_all_placeholders() {
        let (record, catalog) = assigned(0, 0, 3);
        let view = build_view(&record, &catalog, &Sha256Ranker);
        assert_eq!(view, vec![SlotView::placeholder(); 3]);
    }

    #[test]
    fn test_view_order_is_stable() {
        let (record, catalog) = assigned(6, 3, 7);
        let first = build_view(&record, &catalog, &Sha256Ranker);
        let second = build_view(&record, &catalog, &Sha256Ranker);
        assert_eq!(first, second);
    }

    #[test]
    fn test_placeholder_serializes_null_id() {
        let json = serde_json::to_value(SlotView::placeholder()).unwrap();
        assert!(json["slot_id"].is_null());
        assert_eq!(json["status"], "empty");
    }
}
