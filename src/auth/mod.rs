//! Telegram WebApp session authentication.

mod init_data;

#[cfg(test)]
pub(crate) use init_data::session_for;
pub use init_data::{
    AuthError, InitData, SessionVerifier, TelegramUser, VerifiedSession, verify_signature,
};
