use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{Authorization, authorization::Bearer};

use crate::error::ApiError;
use crate::models::{AccountRow, AppState};

/// The signed-in staff account behind a request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account: AccountRow,
}

impl AuthContext {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.account.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "ADMIN_ONLY",
                "Only administrators can perform this action.".into(),
            ))
        }
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::missing_token())?;

            let account = state
                .accounts
                .validate_session(authz.token(), Utc::now())
                .await?;

            Ok(AuthContext { account })
        }
    }
}
