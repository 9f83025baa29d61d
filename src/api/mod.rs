//! HTTP API for the Mini App.
//!
//! User routes take the Telegram WebApp `initData` from the
//! `X-Telegram-WebApp-InitData` header and only act on the session's own user.
//! Admin routes additionally require the session user to be listed in
//! `ADMIN_IDS`.

mod error;
mod handler;
mod types;

pub use error::ApiError;
pub use handler::{AppState, INIT_DATA_HEADER, router};
pub use types::{CreatedSlot, HealthReply, ResetReply, SessionReply, StatusReply, UserReply};
