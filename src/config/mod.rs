//! Configuration module for the backend.
//!
//! Handles loading and validation of the slot catalog seed file, server
//! settings and Telegram credentials.

mod catalog;
mod settings;

pub use catalog::{CatalogConfig, ValidationError};
pub use settings::{ConfigError, ServerSettings, TelegramConfig};
