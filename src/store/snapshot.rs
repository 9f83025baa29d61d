//! On-disk snapshot of the store.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::slots::SlotCatalog;
use crate::user::UserRecord;

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to restore the store after a restart, including pending
/// subscription deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub catalog: SlotCatalog,
    pub users: Vec<UserRecord>,
}

impl StoreSnapshot {
    /// Loads a snapshot from a JSON file. Returns `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>, StoreError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: Self = serde_json::from_str(&content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion(snapshot.version));
        }
        Ok(Some(snapshot))
    }

    /// Saves the snapshot through a temporary file so a crash never leaves a
    /// half-written state file behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
