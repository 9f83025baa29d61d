//! MellStar Backend Library
//!
//! Backend for a Telegram Mini App game that pays progress for subscribing
//! to advertised channels.
//!
//! This crate provides the core functionality for:
//! - Assigning advertising slots to users in a stable per-user order
//! - Tracking each assignment through subscribe and completion
//! - Deriving whether a user's progress timer may run
//! - Verifying Telegram WebApp sessions and serving the HTTP API
//! - Persisting state to a JSON snapshot

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod scheduler;
pub mod slots;
pub mod store;
pub mod user;
