//! Per-user game progress and typed partial updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::slots::UserId;

/// Game state stored for each Telegram user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProgress {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,

    pub level: u32,
    pub free_points: i64,
    pub distributed_points: i64,
    pub payout_bonus: i64,
    pub balance: f64,
    pub ref_points: i64,
    pub current_boost_level: u32,

    #[serde(default)]
    pub timer_started_at: Option<DateTime<Utc>>,
    pub current_checkpoint: u32,
    pub checkpoint_progress: f64,
    /// 0..100 %.
    pub timer_progress: f64,

    /// Number of slots the user should see at once.
    pub current_slot_count: u32,
    /// Derived from slot assignments, see [`crate::slots::timer`].
    pub timer_running: bool,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProgress {
    /// Creates a fresh level-1 record.
    #[must_use]
    pub const fn new(id: UserId, slot_count: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            level: 1,
            free_points: 0,
            distributed_points: 0,
            payout_bonus: 0,
            balance: 0.0,
            ref_points: 0,
            current_boost_level: 0,
            timer_started_at: None,
            current_checkpoint: 0,
            checkpoint_progress: 0.0,
            timer_progress: 0.0,
            current_slot_count: slot_count,
            timer_running: false,
            created_at: now,
            updated_at: None,
        }
    }
}

/// Client-writable subset of [`UserProgress`].
///
/// Unknown keys in the payload are ignored. `timer_running` is deliberately
/// absent: it is derived from slot state only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProgressUpdate {
    pub level: Option<u32>,
    pub free_points: Option<i64>,
    pub distributed_points: Option<i64>,
    pub payout_bonus: Option<i64>,
    pub balance: Option<f64>,
    pub ref_points: Option<i64>,
    pub current_boost_level: Option<u32>,
    pub timer_started_at: Option<DateTime<Utc>>,
    pub current_checkpoint: Option<u32>,
    pub checkpoint_progress: Option<f64>,
    pub timer_progress: Option<f64>,
}

impl ProgressUpdate {
    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Writes every present field into `progress`. An empty update leaves it
    /// untouched, `updated_at` included.
    pub fn apply(&self, progress: &mut UserProgress, now: DateTime<Utc>) {
        fn set<T: Copy>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        if self.is_empty() {
            return;
        }

        set(&mut progress.level, self.level);
        set(&mut progress.free_points, self.free_points);
        set(&mut progress.distributed_points, self.distributed_points);
        set(&mut progress.payout_bonus, self.payout_bonus);
        set(&mut progress.balance, self.balance);
        set(&mut progress.ref_points, self.ref_points);
        set(&mut progress.current_boost_level, self.current_boost_level);
        set(&mut progress.current_checkpoint, self.current_checkpoint);
        set(&mut progress.checkpoint_progress, self.checkpoint_progress);
        set(&mut progress.timer_progress, self.timer_progress.map(|p| p.clamp(0.0, 100.0)));
        if self.timer_started_at.is_some() {
            progress.timer_started_at = self.timer_started_at;
        }

        progress.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_progress_defaults() {
        let progress = UserProgress::new(7, 5, Utc::now());
        assert_eq!(progress.level, 1);
        assert_eq!(progress.current_slot_count, 5);
        assert!(!progress.timer_running);
        assert!(progress.updated_at.is_none());
    }

    #[test]
    fn test_apply_only_touches_present_fields() {
        let now = Utc::now();
        let mut progress = UserProgress::new(7, 5, now);
        progress.balance = 3.5;

        let update = ProgressUpdate {
            level: Some(4),
            free_points: Some(12),
            ..ProgressUpdate::default()
        };
        update.apply(&mut progress, now);

        assert_eq!(progress.level, 4);
        assert_eq!(progress.free_points, 12);
        assert!((progress.balance - 3.5).abs() < f64::EPSILON);
        assert_eq!(progress.updated_at, Some(now));
    }

    #[test]
    fn test_timer_running_in_payload_is_ignored() {
        let update: ProgressUpdate =
            serde_json::from_str(r#"{"level": 2, "timer_running": true, "hacked": 1}"#).unwrap();
        assert_eq!(update.level, Some(2));

        let mut progress = UserProgress::new(7, 5, Utc::now());
        update.apply(&mut progress, Utc::now());
        assert!(!progress.timer_running);
    }

    #[test]
    fn test_timer_progress_is_clamped() {
        let mut progress = UserProgress::new(7, 5, Utc::now());
        let update = ProgressUpdate {
            timer_progress: Some(140.0),
            ..ProgressUpdate::default()
        };
        update.apply(&mut progress, Utc::now());
        assert!((progress.timer_progress - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_update() {
        assert!(ProgressUpdate::default().is_empty());
        let update: ProgressUpdate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn test_empty_update_changes_nothing() {
        let mut progress = UserProgress::new(7, 5, Utc::now());
        let before = progress.clone();
        ProgressUpdate::default().apply(&mut progress, Utc::now());
        assert_eq!(progress, before);
    }
}
