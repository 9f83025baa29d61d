//! Slot and assignment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Telegram user identifier.
pub type UserId = i64;

/// Catalog slot identifier.
pub type SlotId = u64;

/// Per-user assignment row number.
pub type AssignmentId = u64;

/// Advertising placement category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SlotCategory {
    #[default]
    Standard,
    Vip,
    Premium,
}

impl SlotCategory {
    /// Returns true for categories shown ahead of standard slots.
    #[must_use]
    pub const fn is_priority(self) -> bool {
        matches!(self, Self::Vip | Self::Premium)
    }

    /// Display tier: priority slots sort before standard ones.
    #[must_use]
    pub const fn tier(self) -> u8 {
        if self.is_priority() { 0 } else { 1 }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Vip => "vip",
            Self::Premium => "premium",
        }
    }
}

/// Catalog status of a slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    #[default]
    Active,
    Retired,
}

/// A catalog entry users can be asked to subscribe to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub id: SlotId,
    pub category: SlotCategory,
    pub display_name: String,
    pub link: String,
    #[serde(default)]
    pub channel_username: Option<String>,
    #[serde(default)]
    pub advertiser_id: Option<UserId>,
    /// Number of assignments the advertiser paid for; `None` means unlimited.
    #[serde(default)]
    pub required_shows: Option<u32>,
    #[serde(default)]
    pub current_shows: u32,
    pub status: SlotStatus,
    pub created_at: DateTime<Utc>,
}

impl Slot {
    /// Returns true if the slot may be handed out to new users.
    #[must_use]
    pub fn is_assignable(&self) -> bool {
        self.status == SlotStatus::Active && !self.is_exhausted()
    }

    /// Returns true once the paid number of shows has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.required_shows
            .is_some_and(|required| self.current_shows >= required)
    }
}

/// Reasons a new slot is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlotRejection {
    #[error("display name is empty")]
    EmptyName,

    #[error("link '{0}' is not a Telegram link (expected https://t.me/... or @username)")]
    InvalidLink(String),

    #[error("required shows must be greater than zero")]
    ZeroRequiredShows,
}

/// Administrative request to add a slot to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewSlot {
    #[serde(default)]
    pub category: SlotCategory,
    pub display_name: String,
    pub link: String,
    #[serde(default)]
    pub channel_username: Option<String>,
    #[serde(default)]
    pub advertiser_id: Option<UserId>,
    #[serde(default)]
    pub required_shows: Option<u32>,
}

impl NewSlot {
    /// Creates a standard slot request with no show limit.
    #[must_use]
    pub fn new(display_name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            category: SlotCategory::Standard,
            display_name: display_name.into(),
            link: link.into(),
            channel_username: None,
            advertiser_id: None,
            required_shows: None,
        }
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_category(mut self, category: SlotCategory) -> Self {
        self.category = category;
        self
    }

    /// Checks the request before it reaches the catalog.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn check(&self) -> Result<(), SlotRejection> {
        if self.display_name.trim().is_empty() {
            return Err(SlotRejection::EmptyName);
        }
        if !is_telegram_link(&self.link) {
            return Err(SlotRejection::InvalidLink(self.link.clone()));
        }
        if self.required_shows == Some(0) {
            return Err(SlotRejection::ZeroRequiredShows);
        }
        Ok(())
    }
}

fn is_telegram_link(link: &str) -> bool {
    let rest = link
        .strip_prefix("https://t.me/")
        .or_else(|| link.strip_prefix("http://t.me/"))
        .or_else(|| link.strip_prefix('@'));
    rest.is_some_and(|name| !name.is_empty() && !name.contains(char::is_whitespace))
}

/// Lifecycle state of a user-slot pairing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    /// Assigned, waiting for the user to subscribe.
    Active,
    /// User claims a subscription; completion is pending the grace period.
    Subscribed,
    /// Replacement handed out right after a completion.
    NeedSubscribe,
    /// Terminal.
    Completed,
}

impl AssignmentState {
    /// Non-terminal states are shown to the user.
    #[must_use]
    pub const fn is_visible(self) -> bool {
        !matches!(self, Self::Completed)
    }

    /// States that accept a subscribe action.
    #[must_use]
    pub const fn awaits_subscription(self) -> bool {
        matches!(self, Self::Active | Self::NeedSubscribe)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Subscribed => "subscribed",
            Self::NeedSubscribe => "need_subscribe",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slot assigned to one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub slot_id: SlotId,
    pub state: AssignmentState,
    pub assigned_at: DateTime<Utc>,
    #[serde(default)]
    pub subscribed_at: Option<DateTime<Utc>>,
    /// When the pending subscription becomes eligible for completion.
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

impl Assignment {
    #[must_use]
    pub const fn new(
        id: AssignmentId,
        user_id: UserId,
        slot_id: SlotId,
        state: AssignmentState,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            slot_id,
            state,
            assigned_at,
            subscribed_at: None,
            due_at: None,
        }
    }

    /// Returns true if this subscription can be completed at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == AssignmentState::Subscribed
            && self.due_at.or(self.subscribed_at).is_none_or(|due| due <= now)
    }
}
