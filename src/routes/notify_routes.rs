use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::AppState,
    notify::{NotificationRequest, NotificationResult},
};

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    #[serde(alias = "patients")]
    pub requests: Vec<NotificationRequest>,
}

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<NotificationResult>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(send_greetings))
}

pub async fn send_greetings(
    State(state): State<AppState>,
    auth: AuthContext,
    req: Result<Json<NotifyRequest>, JsonRejection>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let Json(req) = req.map_err(|e| ApiError::validation(e.body_text()))?;
    tracing::info!(
        account_id = %auth.account.account_id,
        recipients = req.requests.len(),
        "greeting batch requested"
    );

    // Detached so a dropped connection does not cut a batch off halfway.
    let dispatcher = state.dispatcher.clone();
    let batch = tokio::spawn(async move { dispatcher.dispatch(req.requests).await })
        .await
        .map_err(|e| {
            tracing::error!("dispatch task failed: {e}");
            ApiError::Internal("INTERNAL", "Server error.".into())
        })??;

    Ok(Json(NotifyResponse {
        success: batch.overall_succeeded,
        message: "WhatsApp messages processed".into(),
        results: batch.results,
    }))
}
