//! Request and response bodies.

use serde::Serialize;

use crate::slots::{SlotId, UserId};
use crate::user::UserProgress;

/// `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReply {
    pub status: &'static str,
    pub backend: &'static str,
}

impl HealthReply {
    pub const OK: Self = Self {
        status: "ok",
        backend: "MellStarGame running",
    };
}

/// `POST /api/session`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReply {
    pub user_id: UserId,
    pub new_user: bool,
    pub progress: UserProgress,
}

/// `GET /api/user/{id}`: the stored record, or a marker for unknown users.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserReply {
    Known(Box<UserProgress>),
    Unknown { new_user: bool },
}

/// Plain acknowledgement such as `{"status":"saved"}`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusReply {
    pub status: &'static str,
}

impl StatusReply {
    pub const SAVED: Self = Self { status: "saved" };
    pub const RETIRED: Self = Self { status: "retired" };
}

/// `POST /api/admin/slots`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CreatedSlot {
    pub slot_id: SlotId,
}

/// `DELETE /api/admin/users/{id}/slots`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResetReply {
    pub removed: usize,
}
