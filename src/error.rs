use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::accounts::AuthError;
use crate::notify::DispatchError;

/// Failure of a backing store (clinical records or accounts).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Duplicate(&'static str),
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    /// A collaborator (database, remote API) could not be reached.
    Upstream(&'static str, String),
    Internal(&'static str, String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Invalid user ID or password.".into())
    }

    pub fn missing_token() -> Self {
        ApiError::Unauthorized("MISSING_TOKEN", "Access denied. No token provided.".into())
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            success: false,
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }

    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            ApiError::Unauthorized(code, msg) => (StatusCode::UNAUTHORIZED, *code, msg.as_str()),
            ApiError::Forbidden(code, msg) => (StatusCode::FORBIDDEN, *code, msg.as_str()),
            ApiError::BadRequest(code, msg) => (StatusCode::BAD_REQUEST, *code, msg.as_str()),
            ApiError::NotFound(code, msg) => (StatusCode::NOT_FOUND, *code, msg.as_str()),
            ApiError::Conflict(code, msg) => (StatusCode::CONFLICT, *code, msg.as_str()),
            ApiError::Upstream(code, msg) => (StatusCode::SERVICE_UNAVAILABLE, *code, msg.as_str()),
            ApiError::Internal(code, msg) => (StatusCode::INTERNAL_SERVER_ERROR, *code, msg.as_str()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, msg) = self.parts();
        (status, ApiError::to_error_response(code, msg)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(what) => {
                ApiError::Conflict("DUPLICATE", format!("{what} is already in use."))
            }
            StoreError::NotFound => ApiError::NotFound("NOT_FOUND", "record not found".into()),
            StoreError::Database(err) => {
                // Driver messages can carry hostnames; keep them in the log only.
                tracing::error!("store error: {err}");
                ApiError::Upstream(
                    "UPSTREAM_UNAVAILABLE",
                    "The records store is currently unavailable.".into(),
                )
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let message = e.to_string();
        match e {
            AuthError::InvalidCredentials => ApiError::invalid_credentials(),
            AuthError::Deactivated => ApiError::Unauthorized("ACCOUNT_DEACTIVATED", message),
            AuthError::InvalidToken => ApiError::Unauthorized("INVALID_TOKEN", message),
            AuthError::TokenExpired => ApiError::Unauthorized("SESSION_EXPIRED", message),
            AuthError::AccountGone => ApiError::Unauthorized("ACCOUNT_NOT_FOUND", message),
            AuthError::WrongCurrentPassword => {
                ApiError::BadRequest("WRONG_CURRENT_PASSWORD", message)
            }
            AuthError::Validation(msg) => ApiError::validation(msg),
            AuthError::Duplicate => ApiError::Conflict("DUPLICATE", message),
            AuthError::Hashing(msg) => {
                tracing::error!("password hashing failed: {msg}");
                ApiError::Internal("INTERNAL", "Server error.".into())
            }
            AuthError::Store(err) => err.into(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        let message = e.to_string();
        match e {
            DispatchError::EmptyBatch => ApiError::validation(message),
            DispatchError::MissingConfiguration(_) => {
                ApiError::Internal("NOTIFY_NOT_CONFIGURED", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_share_one_message() {
        let a = ApiError::from(AuthError::InvalidCredentials);
        let b = ApiError::invalid_credentials();
        assert_eq!(a.parts(), b.parts());
    }

    #[test]
    fn store_outage_maps_to_503_without_driver_text() {
        let err = ApiError::from(StoreError::Database(sqlx::Error::PoolTimedOut));
        let (status, code, msg) = err.parts();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "UPSTREAM_UNAVAILABLE");
        assert!(!msg.contains("pool"));
    }

    #[test]
    fn missing_config_is_a_server_error() {
        let err = ApiError::from(DispatchError::MissingConfiguration(vec!["API_KEY"]));
        assert_eq!(err.parts().0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.parts().1, "NOTIFY_NOT_CONFIGURED");
    }
}
