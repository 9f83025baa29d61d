//! Telegram WebApp `initData` verification.
//!
//! The client sends the raw query string it received from Telegram. It is
//! signed with HMAC-SHA-256 over the sorted `key=value` lines (without the
//! `hash` pair), keyed by the SHA-256 digest of the bot token.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::slots::UserId;

type HmacSha256 = Hmac<Sha256>;

/// How far `auth_date` may run ahead of the server clock.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Session verification failures. Callers must not echo these to clients.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Session data is missing")]
    Missing,

    #[error("Session data is malformed")]
    Malformed,

    #[error("Session signature does not match")]
    BadSignature,

    #[error("Session is older than allowed")]
    Expired,

    #[error("Session is dated in the future")]
    FromFuture,

    #[error("Session belongs to a different user")]
    WrongUser,

    #[error("Session user is not an administrator")]
    NotAdmin,
}

/// The `user` object embedded in `initData`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramUser {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

/// Parsed but not yet verified `initData`.
#[derive(Debug, Clone)]
pub struct InitData {
    /// Percent-decoded values, as Telegram signs them.
    fields: BTreeMap<String, String>,
    /// Values exactly as received.
    raw_fields: BTreeMap<String, String>,
    hash: String,
}

impl InitData {
    /// Splits the raw query string into fields.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Malformed`] if a pair has no `=` or `hash` is absent.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        if raw.trim().is_empty() {
            return Err(AuthError::Missing);
        }

        let mut raw_fields = BTreeMap::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or(AuthError::Malformed)?;
            raw_fields.insert(key.to_owned(), value.to_owned());
        }

        let mut fields: BTreeMap<String, String> = form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect();

        let hash = fields.remove("hash").ok_or(AuthError::Malformed)?;
        raw_fields.remove("hash");
        Ok(Self {
            fields,
            raw_fields,
            hash,
        })
    }

    /// Sorted decoded `key=value` lines joined by `\n`.
    #[must_use]
    pub fn data_check_string(&self) -> String {
        check_string(&self.fields)
    }

    /// Same as [`Self::data_check_string`] over the undecoded values.
    #[must_use]
    pub fn raw_check_string(&self) -> String {
        check_string(&self.raw_fields)
    }

    /// Checks the signature in constant time.
    ///
    /// Telegram signs the decoded values; signatures over the values as
    /// received are accepted too.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BadSignature`] on mismatch.
    pub fn verify(&self, bot_token: &str) -> Result<(), AuthError> {
        let expected = hex::decode(&self.hash).map_err(|_| AuthError::BadSignature)?;
        let decoded = self.data_check_string();
        let raw = self.raw_check_string();

        let mut mac = signer(bot_token)?;
        mac.update(decoded.as_bytes());
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
        if raw == decoded {
            return Err(AuthError::BadSignature);
        }

        let mut mac = signer(bot_token)?;
        mac.update(raw.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| AuthError::BadSignature)
    }

    /// `auth_date` as a timestamp, if present and numeric.
    #[must_use]
    pub fn auth_date(&self) -> Option<DateTime<Utc>> {
        let secs = self.fields.get("auth_date")?.parse().ok()?;
        DateTime::from_timestamp(secs, 0)
    }

    /// The embedded user, if present.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Malformed`] if the `user` field is not valid JSON.
    pub fn user(&self) -> Result<Option<TelegramUser>, AuthError> {
        self.fields
            .get("user")
            .map(|json| serde_json::from_str(json).map_err(|_| AuthError::Malformed))
            .transpose()
    }
}

fn check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn signer(bot_token: &str) -> Result<HmacSha256, AuthError> {
    let secret = Sha256::digest(bot_token.as_bytes());
    HmacSha256::new_from_slice(&secret).map_err(|_| AuthError::BadSignature)
}

/// Returns true if `session_token` carries a valid signature for `secret`.
#[must_use]
pub fn verify_signature(session_token: &str, secret: &str) -> bool {
    InitData::parse(session_token).is_ok_and(|data| data.verify(secret).is_ok())
}

/// A session that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub user: Option<TelegramUser>,
    pub auth_date: Option<DateTime<Utc>>,
}

impl VerifiedSession {
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }
}

/// Verifies sessions against the bot token.
#[derive(Clone)]
pub struct SessionVerifier {
    bot_token: String,
    max_age: Option<TimeDelta>,
}

impl SessionVerifier {
    /// Creates a verifier. `max_age_secs == 0` disables the freshness check.
    #[must_use]
    pub fn new(bot_token: impl Into<String>, max_age_secs: u64) -> Self {
        let max_age = i64::try_from(max_age_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(TimeDelta::seconds);
        Self {
            bot_token: bot_token.into(),
            max_age,
        }
    }

    /// Parses and verifies raw `initData`.
    ///
    /// # Errors
    ///
    /// Returns why the session was rejected.
    pub fn verify(&self, raw: &str, now: DateTime<Utc>) -> Result<VerifiedSession, AuthError> {
        let data = InitData::parse(raw)?;
        data.verify(&self.bot_token)?;

        let auth_date = data.auth_date();
        if let Some(max_age) = self.max_age {
            let issued = auth_date.ok_or(AuthError::Expired)?;
            if issued - now > TimeDelta::seconds(MAX_CLOCK_SKEW_SECS) {
                return Err(AuthError::FromFuture);
            }
            if now - issued > max_age {
                return Err(AuthError::Expired);
            }
        }

        Ok(VerifiedSession {
            user: data.user()?,
            auth_date,
        })
    }
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

/// Builds signed, percent-encoded `initData` for tests, the way Telegram does.
#[cfg(test)]
pub(crate) fn sign_init_data(pairs: &[(&str, &str)], bot_token: &str) -> String {
    let fields: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    let mut mac = signer(bot_token).unwrap();
    mac.update(check_string(&fields).as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().copied())
        .append_pair("hash", &hash)
        .finish()
}

/// Signed `initData` for `user_id`, issued at `now`.
#[cfg(test)]
pub(crate) fn session_for(user_id: UserId, bot_token: &str, now: DateTime<Utc>) -> String {
    let user = format!(r#"{{"id":{user_id},"username":"user{user_id}","first_name":"Test"}}"#);
    let auth_date = now.timestamp().to_string();
    sign_init_data(&[("auth_date", &auth_date), ("user", &user)], bot_token)
}
