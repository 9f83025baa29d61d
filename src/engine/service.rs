//! Slot engine service.
//!
//! Every operation that touches assignments runs in one user transaction:
//! read the record, apply the slot logic, recompute `timer_running`, commit.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::EngineError;
use crate::config::ServerSettings;
use crate::slots::assignment::{
    ensure_assignments, missing_count, pick_candidates, visible_slots_unique,
};
use crate::slots::{
    AssignmentState, CompletionOutcome, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_SLOT_COUNT, NewSlot,
    Sha256Ranker, Slot, SlotId, SlotRanker, SlotView, UserId, build_view, lifecycle,
};
use crate::store::Store;
use crate::user::{ProgressUpdate, UserProgress, UserRecord};

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Delay between subscribing and automatic completion.
    pub grace_period: TimeDelta,
    /// Slot count given to new users.
    pub default_slot_count: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            grace_period: grace_from_secs(DEFAULT_GRACE_PERIOD_SECS),
            default_slot_count: DEFAULT_SLOT_COUNT,
        }
    }
}

impl From<&ServerSettings> for EngineSettings {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            grace_period: grace_from_secs(settings.grace_period_secs),
            default_slot_count: settings.default_slot_count,
        }
    }
}

/// Upper bound for the grace period: one year.
const MAX_GRACE_SECS: u64 = 365 * 86_400;

fn grace_from_secs(secs: u64) -> TimeDelta {
    TimeDelta::seconds(i64::try_from(secs.min(MAX_GRACE_SECS)).unwrap_or_default())
}

/// Reply to a subscribe action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscribeReply {
    pub status: AssignmentState,
    pub timer_running: bool,
}

/// Read-only projection of the timer flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressView {
    pub timer_running: bool,
}

/// Assigns, subscribes and completes slots on top of a [`Store`].
#[derive(Debug, Clone)]
pub struct SlotEngine {
    store: Arc<Store>,
    settings: EngineSettings,
    ranker: Arc<dyn SlotRanker>,
}

impl SlotEngine {
    /// Creates an engine using the default SHA-256 ranker.
    #[must_use]
    pub fn new(store: Arc<Store>, settings: EngineSettings) -> Self {
        Self {
            store,
            settings,
            ranker: Arc::new(Sha256Ranker),
        }
    }

    /// Replaces the slot ranker.
    #[must_use]
    pub fn with_ranker(mut self, ranker: Arc<dyn SlotRanker>) -> Self {
        self.ranker = ranker;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<Store> {
        &self.store
    }

    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Creates the user record if missing and refreshes Telegram profile
    /// fields. Returns true if the user was created.
    pub async fn register_user(
        &self,
        user_id: UserId,
        username: Option<String>,
        first_name: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut created = false;
        let mut txn = self
            .store
            .begin_or_insert(user_id, || {
                created = true;
                self.new_record(user_id, now)
            })
            .await;

        if username.is_some() {
            txn.progress.username = username;
        }
        if first_name.is_some() {
            txn.progress.first_name = first_name;
        }
        txn.commit();

        if created {
            info!("New user created: {}", user_id);
        }
        created
    }

    /// Tops the user's slots up and returns the display list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UserNotFound`] for unknown users.
    pub async fn user_slots(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SlotView>, EngineError> {
        let mut txn = self
            .store
            .begin(user_id)
            .await
            .ok_or(EngineError::UserNotFound(user_id))?;

        if self.has_candidates(&txn).await {
            let mut catalog = self.store.catalog_mut().await;
            ensure_assignments(&mut txn, &mut catalog, self.ranker.as_ref(), now);
        }
        txn.refresh_timer();
        debug_assert!(visible_slots_unique(&txn));

        let view = {
            let catalog = self.store.catalog().await;
            build_view(&txn, &catalog, self.ranker.as_ref())
        };
        txn.commit();
        Ok(view)
    }

    /// Marks the user's assignment for `slot_id` as subscribed. Subscribing
    /// to an assignment that is not awaiting it reports its current state.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the user or the assignment does not exist.
    pub async fn subscribe_slot(
        &self,
        user_id: UserId,
        slot_id: SlotId,
        now: DateTime<Utc>,
    ) -> Result<SubscribeReply, EngineError> {
        let mut txn = self
            .store
            .begin(user_id)
            .await
            .ok_or(EngineError::UserNotFound(user_id))?;

        let outcome = lifecycle::subscribe(&mut txn, slot_id, self.settings.grace_period, now);
        let status = outcome
            .state()
            .ok_or(EngineError::AssignmentNotFound { user_id, slot_id })?;

        let timer_running = txn.refresh_timer();
        txn.commit();
        Ok(SubscribeReply {
            status,
            timer_running,
        })
    }

    /// Completes one subscription if its grace period is over. Missing users
    /// and already-advanced assignments are silently ignored.
    pub async fn complete_subscription(
        &self,
        user_id: UserId,
        slot_id: SlotId,
        now: DateTime<Utc>,
    ) -> CompletionOutcome {
        let Some(mut txn) = self.store.begin(user_id).await else {
            debug!("Completion for unknown user {} ignored", user_id);
            return CompletionOutcome::Stale;
        };

        if let Some(outcome) = lifecycle::blocked_completion(&txn, slot_id, now) {
            return outcome;
        }

        let outcome = {
            let mut catalog = self.store.catalog_mut().await;
            lifecycle::complete(&mut txn, &mut catalog, self.ranker.as_ref(), slot_id, now)
        };
        txn.refresh_timer();
        txn.commit();
        outcome
    }

    /// Completes every due subscription of one user. Returns how many completed.
    pub async fn complete_due(&self, user_id: UserId, now: DateTime<Utc>) -> usize {
        let Some(mut txn) = self.store.begin(user_id).await else {
            return 0;
        };

        let due = txn.due_slots(now);
        if due.is_empty() {
            return 0;
        }

        let mut completed = 0;
        for slot_id in due {
            // Locked per completion so other users' sweeps interleave.
            let mut catalog = self.store.catalog_mut().await;
            let outcome =
                lifecycle::complete(&mut txn, &mut catalog, self.ranker.as_ref(), slot_id, now);
            if matches!(outcome, CompletionOutcome::Completed { .. }) {
                completed += 1;
            }
        }
        txn.refresh_timer();
        txn.commit();
        completed
    }

    /// Users with at least one subscription due at `now`.
    pub async fn due_users(&self, now: DateTime<Utc>) -> Vec<UserId> {
        let mut due = Vec::new();
        for user_id in self.store.user_ids().await {
            if self
                .store
                .inspect(user_id, |record| record.has_due(now))
                .await
                .unwrap_or(false)
            {
                due.push(user_id);
            }
        }
        due
    }

    /// Returns the derived timer flag.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UserNotFound`] for unknown users.
    pub async fn user_progress(&self, user_id: UserId) -> Result<ProgressView, EngineError> {
        self.store
            .inspect(user_id, |record| ProgressView {
                timer_running: record.progress.timer_running,
            })
            .await
            .ok_or(EngineError::UserNotFound(user_id))
    }

    /// Returns the full progress record, if the user exists.
    pub async fn progress_record(&self, user_id: UserId) -> Option<UserProgress> {
        self.store
            .inspect(user_id, |record| record.progress.clone())
            .await
    }

    /// Applies a partial progress update, creating the user if needed.
    pub async fn save_progress(&self, user_id: UserId, update: &ProgressUpdate, now: DateTime<Utc>) {
        let mut txn = self
            .store
            .begin_or_insert(user_id, || self.new_record(user_id, now))
            .await;
        update.apply(&mut txn.progress, now);
        txn.commit();
        debug!("Progress saved for user {}", user_id);
    }

    /// Adds a slot to the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSlot`] if the request is malformed.
    pub async fn create_slot(&self, new: NewSlot, now: DateTime<Utc>) -> Result<SlotId, EngineError> {
        let name = new.display_name.clone();
        let id = self.store.catalog_mut().await.insert(new, now)?;
        info!("Slot {} created: {}", id, name);
        Ok(id)
    }

    /// Retires a slot; it stays in the catalog but is no longer assigned.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SlotNotFound`] for unknown ids.
    pub async fn retire_slot(&self, slot_id: SlotId) -> Result<(), EngineError> {
        if !self.store.catalog_mut().await.retire(slot_id) {
            return Err(EngineError::SlotNotFound(slot_id));
        }
        info!("Slot {} retired", slot_id);
        Ok(())
    }

    /// All catalog slots, active and retired.
    pub async fn list_slots(&self) -> Vec<Slot> {
        self.store.catalog().await.iter().cloned().collect()
    }

    /// Deletes a user's whole assignment history. Administrative reset.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UserNotFound`] for unknown users.
    pub async fn reset_user_slots(&self, user_id: UserId) -> Result<usize, EngineError> {
        let mut txn = self
            .store
            .begin(user_id)
            .await
            .ok_or(EngineError::UserNotFound(user_id))?;
        let removed = txn.clear_assignments();
        txn.commit();
        info!("Reset {} assignment(s) for user {}", removed, user_id);
        Ok(removed)
    }

    /// True if the view is short and the catalog can fill at least one card.
    async fn has_candidates(&self, record: &UserRecord) -> bool {
        if missing_count(record.progress.current_slot_count, record.visible_count()) == 0 {
            return false;
        }
        let catalog = self.store.catalog().await;
        !pick_candidates(record, &catalog, self.ranker.as_ref(), 1, None).is_empty()
    }

    fn new_record(&self, user_id: UserId, now: DateTime<Utc>) -> UserRecord {
        UserRecord::new(UserProgress::new(
            user_id,
            self.settings.default_slot_count,
            now,
        ))
    }
}
