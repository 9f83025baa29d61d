//! In-memory record store with per-user transactions and JSON snapshots.
//!
//! Each user record sits behind its own async mutex. A [`UserTxn`] holds that
//! mutex for its whole read-modify-write sequence and works on a draft copy:
//! `commit` publishes the draft, dropping the transaction discards it.

mod snapshot;

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

pub use snapshot::{SNAPSHOT_VERSION, StoreSnapshot};

use crate::slots::{SlotCatalog, UserId};
use crate::user::UserRecord;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode state file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported state file version: {0}")]
    UnsupportedVersion(u32),
}

/// Shared store for the slot catalog and all user records.
#[derive(Debug, Default)]
pub struct Store {
    catalog: RwLock<SlotCatalog>,
    users: RwLock<HashMap<UserId, Arc<Mutex<UserRecord>>>>,
    dirty: AtomicBool,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let users = snapshot
            .users
            .into_iter()
            .map(|record| (record.user_id(), Arc::new(Mutex::new(record))))
            .collect();

        Self {
            catalog: RwLock::new(snapshot.catalog),
            users: RwLock::new(users),
            dirty: AtomicBool::new(false),
        }
    }

    /// Loads the store from `path`, or starts empty if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        match StoreSnapshot::load(&path)? {
            Some(snapshot) => {
                info!(
                    "Restored {} slot(s) and {} user(s) from {}",
                    snapshot.catalog.len(),
                    snapshot.users.len(),
                    path.as_ref().display()
                );
                Ok(Self::from_snapshot(snapshot))
            }
            None => {
                info!("No state file at {}, starting empty", path.as_ref().display());
                Ok(Self::new())
            }
        }
    }

    /// Starts a transaction on an existing user. Returns `None` if unknown.
    pub async fn begin(&self, user_id: UserId) -> Option<UserTxn<'_>> {
        let cell = self.users.read().await.get(&user_id).cloned()?;
        Some(UserTxn::new(self, cell.lock_owned().await))
    }

    /// Starts a transaction on a user, inserting `init()` first if unknown.
    pub async fn begin_or_insert(
        &self,
        user_id: UserId,
        init: impl FnOnce() -> UserRecord,
    ) -> UserTxn<'_> {
        let cell = {
            let mut users = self.users.write().await;
            Arc::clone(users.entry(user_id).or_insert_with(|| {
                debug!("Creating record for user {}", user_id);
                self.mark_dirty();
                Arc::new(Mutex::new(init()))
            }))
        };
        UserTxn::new(self, cell.lock_owned().await)
    }

    /// Runs `f` on a user record without starting a transaction.
    pub async fn inspect<R>(&self, user_id: UserId, f: impl FnOnce(&UserRecord) -> R) -> Option<R> {
        let cell = self.users.read().await.get(&user_id).cloned()?;
        let record = cell.lock().await;
        Some(f(&record))
    }

    /// Returns true if a record exists for `user_id`.
    pub async fn contains(&self, user_id: UserId) -> bool {
        self.users.read().await.contains_key(&user_id)
    }

    /// Ids of all known users.
    pub async fn user_ids(&self) -> Vec<UserId> {
        self.users.read().await.keys().copied().collect()
    }

    /// Read access to the catalog.
    pub async fn catalog(&self) -> RwLockReadGuard<'_, SlotCatalog> {
        self.catalog.read().await
    }

    /// Write access to the catalog. The store is marked dirty when the guard
    /// is dropped, and only if the catalog actually changed.
    ///
    /// Lock order: a user transaction may take this lock, never the reverse.
    pub async fn catalog_mut(&self) -> CatalogGuard<'_> {
        let guard = self.catalog.write().await;
        let revision = guard.revision();
        CatalogGuard {
            store: self,
            guard,
            revision,
        }
    }

    /// Copies the whole store. Never holds the catalog and a user lock at once.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let catalog = self.catalog.read().await.clone();
        let cells: Vec<_> = self.users.read().await.values().cloned().collect();

        let mut users = Vec::with_capacity(cells.len());
        for cell in cells {
            users.push(cell.lock().await.clone());
        }
        users.sort_by_key(UserRecord::user_id);

        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            catalog,
            users,
        }
    }

    /// Writes a snapshot to `path` and clears the dirty flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        self.dirty.store(false, Ordering::SeqCst);
        let snapshot = self.snapshot().await;
        if let Err(e) = snapshot.save(&path) {
            self.mark_dirty();
            return Err(e);
        }
        debug!("State saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Saves only if something changed since the last save. Returns true if written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn flush(&self, path: impl AsRef<Path>) -> Result<bool, StoreError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.save(path).await?;
        Ok(true)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }
}

/// Write access to the catalog that tracks whether anything changed.
#[derive(Debug)]
pub struct CatalogGuard<'a> {
    store: &'a Store,
    guard: RwLockWriteGuard<'a, SlotCatalog>,
    revision: u64,
}

impl Deref for CatalogGuard<'_> {
    type Target = SlotCatalog;

    fn deref(&self) -> &SlotCatalog {
        &self.guard
    }
}

impl DerefMut for CatalogGuard<'_> {
    fn deref_mut(&mut self) -> &mut SlotCatalog {
        &mut self.guard
    }
}

impl Drop for CatalogGuard<'_> {
    fn drop(&mut self) {
        if self.guard.revision() != self.revision {
            self.store.mark_dirty();
        }
    }
}

/// Exclusive read-modify-write access to one user record.
#[derive(Debug)]
pub struct UserTxn<'a> {
    store: &'a Store,
    guard: OwnedMutexGuard<UserRecord>,
    draft: UserRecord,
}

impl<'a> UserTxn<'a> {
    fn new(store: &'a Store, guard: OwnedMutexGuard<UserRecord>) -> Self {
        let draft = guard.clone();
        Self { store, guard, draft }
    }

    /// Publishes the draft.
    pub fn commit(self) {
        let Self {
            store,
            mut guard,
            draft,
        } = self;
        if *guard != draft {
            *guard = draft;
            store.mark_dirty();
        }
    }
}

impl Deref for UserTxn<'_> {
    type Target = UserRecord;

    fn deref(&self) -> &UserRecord {
        &self.draft
    }
}

impl DerefMut for UserTxn<'_> {
    fn deref_mut(&mut self) -> &mut UserRecord {
        &mut self.draft
    }
}
