//! Slot catalog.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{NewSlot, Slot, SlotId, SlotRejection, SlotStatus};

/// All slots ever created, keyed by id. Slots are retired, never removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotCatalog {
    slots: BTreeMap<SlotId, Slot>,
    #[serde(default)]
    last_id: SlotId,
    /// Bumped on every mutation; not persisted.
    #[serde(skip)]
    revision: u64,
}

impl SlotCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a slot and returns its id.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason if the request is malformed.
    pub fn insert(&mut self, new: NewSlot, now: DateTime<Utc>) -> Result<SlotId, SlotRejection> {
        new.check()?;

        self.last_id += 1;
        self.revision += 1;
        let id = self.last_id;
        self.slots.insert(
            id,
            Slot {
                id,
                category: new.category,
                display_name: new.display_name,
                link: new.link,
                channel_username: new.channel_username,
                advertiser_id: new.advertiser_id,
                required_shows: new.required_shows,
                current_shows: 0,
                status: SlotStatus::Active,
                created_at: now,
            },
        );
        Ok(id)
    }

    /// Retires a slot. Returns false if the id is unknown.
    pub fn retire(&mut self, id: SlotId) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot) => {
                if slot.status != SlotStatus::Retired {
                    slot.status = SlotStatus::Retired;
                    self.revision += 1;
                }
                true
            }
            None => false,
        }
    }

    /// Counts one more assignment of the slot.
    pub fn record_show(&mut self, id: SlotId) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.current_shows = slot.current_shows.saturating_add(1);
            self.revision += 1;
        }
    }

    /// Changes whenever the catalog is mutated.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(&id)
    }

    /// Slots that can be handed out right now.
    pub fn assignable(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values().filter(|slot| slot.is_assignable())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
