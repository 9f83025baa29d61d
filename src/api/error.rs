//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::auth::AuthError;
use crate::engine::EngineError;

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Shown to clients as a bare "invalid auth" whatever the cause.
    #[error("invalid auth")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Invalid request body: {0}")]
    BadBody(#[from] serde_json::Error),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::FORBIDDEN,
            Self::Engine(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Engine(_) | Self::BadBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Auth(reason) = &self {
            debug!("Rejected session: {}", reason);
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(AuthError::BadSignature).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(EngineError::UserNotFound(1)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(EngineError::InvalidSlot(crate::slots::SlotRejection::EmptyName))
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_auth_reason_is_hidden() {
        assert_eq!(ApiError::from(AuthError::Expired).to_string(), "invalid auth");
        assert_eq!(ApiError::from(AuthError::NotAdmin).to_string(), "invalid auth");
    }
}
