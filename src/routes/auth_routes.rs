use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;

use crate::{
    accounts::ProfileUpdate,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::*,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile).put(update_profile))
        .route("/change-password", put(change_password))
}

/// Admin-only: creates a staff account and hands back a token for it.
pub async fn register(
    State(state): State<AppState>,
    auth: AuthContext,
    req: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    auth.require_admin()?;
    let Json(req) = req.map_err(|e| ApiError::validation(e.body_text()))?;

    let account = state
        .accounts
        .register(&req.name, &req.login_id, &req.password, req.is_admin)
        .await?;
    let issued = state.accounts.issue_token(&account, Utc::now());

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "Account registered successfully".into(),
            data: AuthResponseData {
                account: AccountProfile::from(&account),
                token: issued.token,
                expires_at: issued.expires_at,
            },
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = req.map_err(|e| ApiError::validation(e.body_text()))?;
    let (account, issued) = state
        .accounts
        .login(&req.login_id, &req.password, Utc::now())
        .await?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".into(),
        data: AuthResponseData {
            account: AccountProfile::from(&account),
            token: issued.token,
            expires_at: issued.expires_at,
        },
    }))
}

pub async fn profile(auth: AuthContext) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        success: true,
        message: "Profile retrieved successfully".into(),
        data: ProfileData {
            account: AccountProfile::from(&auth.account),
        },
    })
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    req: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let Json(req) = req.map_err(|e| ApiError::validation(e.body_text()))?;
    let updated = state
        .accounts
        .update_profile(
            &auth.account,
            ProfileUpdate {
                display_name: req.name,
                login_id: req.login_id,
            },
        )
        .await?;

    Ok(Json(ProfileResponse {
        success: true,
        message: "Profile updated successfully".into(),
        data: ProfileData {
            account: AccountProfile::from(&updated),
        },
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    req: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Json(req) = req.map_err(|e| ApiError::validation(e.body_text()))?;
    state
        .accounts
        .change_password(&auth.account, &req.current_password, &req.new_password)
        .await?;

    Ok(Json(OkResponse {
        success: true,
        message: "Password changed successfully".into(),
    }))
}
