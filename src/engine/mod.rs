//! Slot engine: the transactional layer between the HTTP API, the sweeper
//! and the slot rotation logic.

mod error;
mod service;

pub use error::EngineError;
pub use service::{EngineSettings, ProgressView, SlotEngine, SubscribeReply};
