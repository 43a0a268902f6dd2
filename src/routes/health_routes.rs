use axum::{Json, Router, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use crate::models::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Birthday greeter API is running",
        timestamp: Utc::now(),
        version: VERSION,
    })
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "name": "birthday-greeter",
        "version": VERSION,
        "endpoints": {
            "health": "GET /api/health",
            "auth": "/api/auth (register, login, profile, change-password)",
            "patients": "/api/patients (id/{uhid}, dob/{YYYY-MM-DD}, birthday/today, birthday/tomorrow)",
            "notify": "POST /api/notify"
        }
    }))
}
