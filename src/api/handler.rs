//! Route handlers.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::de::DeserializeOwned;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::error::ApiError;
use super::types::{
    CreatedSlot, HealthReply, ResetReply, SessionReply, StatusReply, UserReply,
};
use crate::auth::{AuthError, SessionVerifier, TelegramUser, VerifiedSession};
use crate::engine::{EngineError, ProgressView, SlotEngine, SubscribeReply};
use crate::slots::{NewSlot, Slot, SlotId, SlotView, UserId};
use crate::user::ProgressUpdate;

/// Header carrying the raw Telegram WebApp `initData`.
pub const INIT_DATA_HEADER: &str = "x-telegram-webapp-initdata";

/// Shared state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    engine: Arc<SlotEngine>,
    verifier: SessionVerifier,
    admin_ids: Arc<HashSet<UserId>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        engine: Arc<SlotEngine>,
        verifier: SessionVerifier,
        admin_ids: HashSet<UserId>,
    ) -> Self {
        Self {
            engine,
            verifier,
            admin_ids: Arc::new(admin_ids),
        }
    }

    /// Verifies the session header.
    fn session(&self, headers: &HeaderMap) -> Result<VerifiedSession, ApiError> {
        let raw = headers
            .get(INIT_DATA_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::Missing)?;
        Ok(self.verifier.verify(raw, Utc::now())?)
    }

    /// Verifies the session and checks it belongs to `user_id`.
    fn authorize_user(
        &self,
        headers: &HeaderMap,
        user_id: UserId,
    ) -> Result<VerifiedSession, ApiError> {
        let session = self.session(headers)?;
        if session.user_id() != Some(user_id) {
            return Err(AuthError::WrongUser.into());
        }
        Ok(session)
    }

    /// Verifies the session and checks its user is an administrator.
    fn authorize_admin(&self, headers: &HeaderMap) -> Result<UserId, ApiError> {
        self.session(headers)?
            .user_id()
            .filter(|id| self.admin_ids.contains(id))
            .ok_or(ApiError::Auth(AuthError::NotAdmin))
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/session", post(open_session))
        .route("/api/user/{user_id}", get(get_user).post(save_user))
        .route("/api/user/{user_id}/progress", get(get_progress))
        .route("/api/slots/{user_id}", get(get_slots))
        .route(
            "/api/slots/{user_id}/subscribe/{slot_id}",
            post(subscribe_slot),
        )
        .route("/api/admin/slots", get(list_slots).post(create_slot))
        .route("/api/admin/slots/{slot_id}/retire", post(retire_slot))
        .route("/api/admin/users/{user_id}/slots", delete(reset_user_slots))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bodies are parsed only after authorization so bad credentials always win.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    Ok(serde_json::from_slice(body)?)
}

async fn health() -> Json<HealthReply> {
    Json(HealthReply::OK)
}

async fn open_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionReply>, ApiError> {
    let session = state.session(&headers)?;
    let TelegramUser {
        id,
        username,
        first_name,
    } = session.user.ok_or(AuthError::Malformed)?;

    let new_user = state
        .engine
        .register_user(id, username, first_name, Utc::now())
        .await;
    let progress = state
        .engine
        .progress_record(id)
        .await
        .ok_or(EngineError::UserNotFound(id))?;

    Ok(Json(SessionReply {
        user_id: id,
        new_user,
        progress,
    }))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    headers: HeaderMap,
) -> Result<Json<UserReply>, ApiError> {
    state.authorize_user(&headers, user_id)?;
    let reply = match state.engine.progress_record(user_id).await {
        Some(progress) => UserReply::Known(Box::new(progress)),
        None => UserReply::Unknown { new_user: true },
    };
    Ok(Json(reply))
}

async fn save_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StatusReply>, ApiError> {
    state.authorize_user(&headers, user_id)?;
    let update: ProgressUpdate = parse_body(&body)?;
    state
        .engine
        .save_progress(user_id, &update, Utc::now())
        .await;
    Ok(Json(StatusReply::SAVED))
}

async fn get_progress(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    headers: HeaderMap,
) -> Result<Json<ProgressView>, ApiError> {
    state.authorize_user(&headers, user_id)?;
    Ok(Json(state.engine.user_progress(user_id).await?))
}

async fn get_slots(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    headers: HeaderMap,
) -> Result<Json<Vec<SlotView>>, ApiError> {
    state.authorize_user(&headers, user_id)?;
    Ok(Json(state.engine.user_slots(user_id, Utc::now()).await?))
}

async fn subscribe_slot(
    State(state): State<AppState>,
    Path((user_id, slot_id)): Path<(UserId, SlotId)>,
    headers: HeaderMap,
) -> Result<Json<SubscribeReply>, ApiError> {
    state.authorize_user(&headers, user_id)?;
    let reply = state
        .engine
        .subscribe_slot(user_id, slot_id, Utc::now())
        .await?;
    Ok(Json(reply))
}

async fn list_slots(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Slot>>, ApiError> {
    state.authorize_admin(&headers)?;
    Ok(Json(state.engine.list_slots().await))
}

async fn create_slot(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreatedSlot>, ApiError> {
    let admin = state.authorize_admin(&headers)?;
    let new: NewSlot = parse_body(&body)?;
    let slot_id = state.engine.create_slot(new, Utc::now()).await?;
    info!("Admin {} created slot {}", admin, slot_id);
    Ok(Json(CreatedSlot { slot_id }))
}

async fn retire_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<SlotId>,
    headers: HeaderMap,
) -> Result<Json<StatusReply>, ApiError> {
    let admin = state.authorize_admin(&headers)?;
    state.engine.retire_slot(slot_id).await?;
    info!("Admin {} retired slot {}", admin, slot_id);
    Ok(Json(StatusReply::RETIRED))
}

async fn reset_user_slots(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    headers: HeaderMap,
) -> Result<Json<ResetReply>, ApiError> {
    let admin = state.authorize_admin(&headers)?;
    let removed = state.engine.reset_user_slots(user_id).await?;
    info!("Admin {} reset slots of user {}", admin, user_id);
    Ok(Json(ResetReply { removed }))
}
