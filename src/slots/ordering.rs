//! Deterministic per-user slot ordering.
//!
//! Every (user, slot) pair gets a stable rank in `[0, 1)` derived from a
//! SHA-256 digest of both ids, so each user sees an individual but
//! reproducible order without any stored random state.

use std::cmp::Ordering;
use std::fmt;

use sha2::{Digest, Sha256};

use super::model::{SlotCategory, SlotId, UserId};

/// 2^53: ranks keep the 53 high bits so they fit an `f64` mantissa exactly.
const RANK_SCALE: f64 = 9_007_199_254_740_992.0;

/// Produces the per-user rank of a slot.
///
/// Ranks are never persisted, so swapping the implementation only changes
/// future presentation order.
pub trait SlotRanker: Send + Sync + fmt::Debug {
    /// Returns a value in `[0, 1)`; identical inputs must give identical output.
    fn rank(&self, user_id: UserId, slot_id: SlotId) -> f64;
}

/// Default ranker backed by [`rank`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Ranker;

impl SlotRanker for Sha256Ranker {
    fn rank(&self, user_id: UserId, slot_id: SlotId) -> f64 {
        rank(user_id, slot_id)
    }
}

/// Hashes `"{user_id}:{slot_id}"` into `[0, 1)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rank(user_id: UserId, slot_id: SlotId) -> f64 {
    let digest = Sha256::digest(format!("{user_id}:{slot_id}").as_bytes());

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let bits = u64::from_be_bytes(prefix) >> 11;

    bits as f64 / RANK_SCALE
}

/// Compares two slots for display to one user: priority tier, then rank,
/// then slot id.
#[must_use]
pub fn compare_for_user(
    ranker: &dyn SlotRanker,
    user_id: UserId,
    a: (SlotCategory, SlotId),
    b: (SlotCategory, SlotId),
) -> Ordering {
    a.0.tier()
        .cmp(&b.0.tier())
        .then_with(|| ranker.rank(user_id, a.1).total_cmp(&ranker.rank(user_id, b.1)))
        .then_with(|| a.1.cmp(&b.1))
}

/// Sorts `items` into the user's display order.
pub fn sort_for_user<T>(
    ranker: &dyn SlotRanker,
    user_id: UserId,
    items: &mut [T],
    key: impl Fn(&T) -> (SlotCategory, SlotId),
) {
    items.sort_by(|a, b| compare_for_user(ranker, user_id, key(a), key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gives every slot the same rank to exercise the id tie-break.
    #[derive(Debug)]
    struct FlatRanker;

    impl SlotRanker for FlatRanker {
        fn rank(&self, _user_id: UserId, _slot_id: SlotId) -> f64 {
            0.5
        }
    }

    #[test]
    fn test_rank_is_deterministic() {
        for slot in 0..50 {
            assert_eq!(rank(777, slot).to_bits(), rank(777, slot).to_bits());
        }
    }

    #[test]
    fn test_rank_in_unit_interval() {
        for user in [-5, 0, 1, 123_456_789] {
            for slot in 0..200 {
                let r = rank(user, slot);
                assert!((0.0..1.0).contains(&r), "rank {r} out of range");
            }
        }
    }

    #[test]
    fn test_rank_varies_between_users() {
        let order = |user: UserId| {
            let mut slots: Vec<SlotId> = (1..=20).collect();
            sort_for_user(&Sha256Ranker, user, &mut slots, |s| (SlotCategory::Standard, *s));
            slots
        };
        assert_eq!(order(10), order(10));
        assert_ne!(order(10), order(11));
    }

    #[test]
    fn test_ids_are_separated() {
        // "1" + "23" and "12" + "3" must not collide.
        assert_ne!(rank(1, 23).to_bits(), rank(12, 3).to_bits());
    }

    #[test]
    fn test_priority_tier_first_then_tie_break_by_id() {
        let mut slots = vec![
            (SlotCategory::Standard, 1),
            (SlotCategory::Premium, 9),
            (SlotCategory::Standard, 0),
            (SlotCategory::Vip, 4),
        ];
        sort_for_user(&FlatRanker, 1, &mut slots, |s| *s);
        assert_eq!(
            slots,
            vec![
                (SlotCategory::Vip, 4),
                (SlotCategory::Premium, 9),
                (SlotCategory::Standard, 0),
                (SlotCategory::Standard, 1),
            ]
        );
    }
}
