//! Server settings and Telegram configuration.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::slots::{DEFAULT_GRACE_PERIOD_SECS, DEFAULT_SLOT_COUNT, UserId};

/// Telegram bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather; also the secret WebApp sessions are signed with.
    pub bot_token: String,
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub const fn new(bot_token: String) -> Self {
        Self { bot_token }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `BOT_TOKEN` to be set.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = std::env::var("BOT_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar("BOT_TOKEN"))?;

        Ok(Self { bot_token })
    }
}

/// Server and engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address the HTTP server listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Path of the JSON state file.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Delay before a subscription is completed, in seconds.
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    /// How often due subscriptions are swept, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Slot count for newly created users.
    #[serde(default = "default_slot_count")]
    pub default_slot_count: u32,

    /// Telegram ids allowed to use admin routes.
    #[serde(default)]
    pub admin_ids: HashSet<UserId>,

    /// Maximum age of a WebApp session in seconds; 0 disables the check.
    #[serde(default = "default_auth_max_age")]
    pub auth_max_age_secs: u64,

    /// Log level for the application.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 10000)
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state.json")
}

const fn default_grace_period() -> u64 {
    DEFAULT_GRACE_PERIOD_SECS
}

const fn default_sweep_interval() -> u64 {
    5
}

const fn default_slot_count() -> u32 {
    DEFAULT_SLOT_COUNT
}

const fn default_auth_max_age() -> u64 {
    86_400 // one day
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            state_path: default_state_path(),
            grace_period_secs: default_grace_period(),
            sweep_interval_secs: default_sweep_interval(),
            default_slot_count: default_slot_count(),
            admin_ids: HashSet::new(),
            auth_max_age_secs: default_auth_max_age(),
            log_level: default_log_level(),
        }
    }
}

impl ServerSettings {
    /// Creates server settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; unparsable values fall back to defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
            value.and_then(|s| s.trim().parse().ok())
        }

        let defaults = Self::default();
        let host: IpAddr = parsed(lookup("BIND_HOST")).unwrap_or(defaults.bind_addr.ip());
        let port: u16 = parsed(lookup("PORT")).unwrap_or(defaults.bind_addr.port());

        Self {
            bind_addr: SocketAddr::new(host, port),
            state_path: lookup("STATE_PATH").map_or(defaults.state_path, PathBuf::from),
            grace_period_secs: parsed(lookup("GRACE_PERIOD_SECS"))
                .unwrap_or(defaults.grace_period_secs),
            sweep_interval_secs: parsed(lookup("SWEEP_INTERVAL_SECS"))
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.sweep_interval_secs),
            default_slot_count: parsed(lookup("DEFAULT_SLOT_COUNT"))
                .unwrap_or(defaults.default_slot_count),
            admin_ids: lookup("ADMIN_IDS")
                .map(|ids| parse_admin_ids(&ids))
                .unwrap_or_default(),
            auth_max_age_secs: parsed(lookup("AUTH_MAX_AGE_SECS"))
                .unwrap_or(defaults.auth_max_age_secs),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }
}

/// Parses a comma-separated id list, skipping invalid entries.
fn parse_admin_ids(raw: &str) -> HashSet<UserId> {
    raw.split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
}
