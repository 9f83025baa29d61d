//! Slot catalog seed file and validation.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slots::{NewSlot, SlotCategory, SlotRejection};

/// Errors that can occur while validating a catalog seed file.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Slot at index {index} ({name:?}) is invalid: {reason}")]
    InvalidSlot {
        index: usize,
        name: String,
        reason: SlotRejection,
    },

    #[error("Duplicate slot link found: {link}")]
    DuplicateLink { link: String },

    #[error("No slots configured")]
    NoSlots,

    #[error("Failed to read catalog file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse catalog file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Initial slots loaded into an empty catalog at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub slots: Vec<NewSlot>,
}

impl CatalogConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ValidationError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates every slot.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.slots.is_empty() {
            return Err(ValidationError::NoSlots);
        }
        self.validate_all().into_iter().collect()
    }

    /// Returns one validation result per slot.
    #[must_use]
    pub fn validate_all(&self) -> Vec<Result<(), ValidationError>> {
        if self.slots.is_empty() {
            return vec![Err(ValidationError::NoSlots)];
        }

        let mut seen_links = HashSet::new();
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.check().map_err(|reason| ValidationError::InvalidSlot {
                    index,
                    name: slot.display_name.clone(),
                    reason,
                })?;

                if !seen_links.insert(normalize_link(&slot.link)) {
                    return Err(ValidationError::DuplicateLink {
                        link: slot.link.clone(),
                    });
                }
                Ok(())
            })
            .collect()
    }

    /// Number of priority (vip/premium) slots.
    #[must_use]
    pub fn priority_count(&self) -> usize {
        self.slots.iter().filter(|s| s.category.is_priority()).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Creates an example configuration for users to reference.
    #[must_use]
    pub fn example() -> Self {
        let mut partner = NewSlot::new("Partner Channel", "https://t.me/partner_channel")
            .with_category(SlotCategory::Vip);
        partner.channel_username = Some("partner_channel".to_owned());
        partner.required_shows = Some(1000);

        Self {
            slots: vec![
                partner,
                NewSlot::new("Daily News", "https://t.me/daily_news"),
                NewSlot::new("Crypto Digest", "@crypto_digest"),
                NewSlot::new("Game Updates", "https://t.me/game_updates"),
            ],
        }
    }
}

/// `@name`, `https://t.me/name` and `http://t.me/name` point at the same channel.
fn normalize_link(link: &str) -> String {
    link.trim_start_matches("https://t.me/")
        .trim_start_matches("http://t.me/")
        .trim_start_matches('@')
        .trim_end_matches('/')
        .to_lowercase()
}
