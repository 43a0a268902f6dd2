use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::AccountService;
use crate::notify::Dispatcher;
use crate::patients::PatientDirectory;

#[derive(Clone)]
pub struct AppState {
    pub patients: PatientDirectory,
    pub accounts: AccountService,
    pub dispatcher: Arc<Dispatcher>,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "userId")]
    pub login_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    #[serde(alias = "userId")]
    pub login_id: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    #[serde(alias = "userId")]
    pub login_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub data: AuthResponseData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponseData {
    pub account: AccountProfile,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub message: String,
    pub data: ProfileData,
}

#[derive(Debug, Serialize)]
pub struct ProfileData {
    pub account: AccountProfile,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub success: bool,
    pub message: String,
}

/// Outward view of an account; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: Uuid,
    pub display_name: String,
    pub login_id: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub account_id: Uuid,
    pub display_name: String,
    pub login_id: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AccountRow> for AccountProfile {
    fn from(row: &AccountRow) -> Self {
        Self {
            id: row.account_id,
            display_name: row.display_name.clone(),
            login_id: row.login_id.clone(),
            is_active: row.is_active,
            is_admin: row.is_admin,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
