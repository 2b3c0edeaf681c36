//! API error handling
//!
//! Every error is returned as `{ "code": <i32>, "msg": <string> }` with a
//! matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradeseven_core::CoreError;
use tradeseven_engine::EngineError;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    // =========================================================================
    // Request Errors (-1100 to -1199)
    // =========================================================================
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    // =========================================================================
    // Battle Errors (-2000 to -2099)
    // =========================================================================
    #[error("Battle not found: {0}")]
    BattleNotFound(String),

    #[error("You cannot join your own battle")]
    SelfJoin,

    #[error("{0}")]
    TypeMismatch(String),

    #[error("Not a participant")]
    NotParticipant,

    #[error("Battle not settled yet")]
    NotSettled,

    // =========================================================================
    // User Errors (-3000 to -3099)
    // =========================================================================
    #[error("User not found: {0}")]
    UserNotFound(String),

    // =========================================================================
    // Internal Errors (-5000 to -5099)
    // =========================================================================
    #[error("Storage error")]
    StorageError,
}

impl ApiError {
    pub fn error_code(&self) -> i32 {
        match self {
            Self::InvalidParameter(_) => -1102,
            Self::ValidationError(_) => -1100,

            Self::BattleNotFound(_) => -2001,
            Self::SelfJoin => -2002,
            Self::TypeMismatch(_) => -2003,
            Self::NotParticipant => -2004,
            Self::NotSettled => -2005,

            Self::UserNotFound(_) => -3001,

            Self::StorageError => -5002,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidParameter(_) | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NotParticipant => StatusCode::FORBIDDEN,
            Self::BattleNotFound(_) | Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::SelfJoin | Self::TypeMismatch(_) | Self::NotSettled => StatusCode::CONFLICT,
            Self::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub msg: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.error_code(),
            msg: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (self.status_code(), Json(ErrorResponse::from(&self))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(core) => match core {
                CoreError::NotFound(code) => Self::BattleNotFound(code),
                CoreError::SelfJoin => Self::SelfJoin,
                e @ CoreError::TypeMismatch { .. } => Self::TypeMismatch(e.to_string()),
                e => Self::ValidationError(e.to_string()),
            },
            EngineError::BattleNotFound(id) => Self::BattleNotFound(id.to_string()),
            EngineError::NotParticipant { .. } => Self::NotParticipant,
            EngineError::NotSettled(_) => Self::NotSettled,
            EngineError::UserNotFound(username) => Self::UserNotFound(username),
            EngineError::Store(e) => {
                tracing::warn!(error = %e, "persistence failure");
                Self::StorageError
            }
        }
    }
}
