use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::AccountRow;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub display_name: String,
    pub login_id: String,
    pub password_hash: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub login_id: Option<String>,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_login_id(&self, login_id: &str) -> Result<Option<AccountRow>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccountRow>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the login id is taken.
    async fn insert(&self, new: NewAccount) -> Result<AccountRow, StoreError>;

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Applies `changes` atomically; a login id collision leaves the row untouched.
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<AccountRow, StoreError>;

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), StoreError>;
}

const ACCOUNT_COLUMNS: &str = "account_id, display_name, login_id, password_hash, is_active, \
                               is_admin, last_login_at, created_at, updated_at";

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate("loginId"),
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_login_id(&self, login_id: &str) -> Result<Option<AccountRow>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM staff_account WHERE login_id = $1"
        ))
        .bind(login_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccountRow>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM staff_account WHERE account_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert(&self, new: NewAccount) -> Result<AccountRow, StoreError> {
        sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO staff_account (display_name, login_id, password_hash, is_active, is_admin)
            VALUES ($1, $2, $3, TRUE, $4)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&new.display_name)
        .bind(&new.login_id)
        .bind(&new.password_hash)
        .bind(new.is_admin)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE staff_account
            SET last_login_at = $1, updated_at = now()
            WHERE account_id = $2
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<AccountRow, StoreError> {
        sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE staff_account
            SET display_name = COALESCE($1, display_name),
                login_id = COALESCE($2, login_id),
                updated_at = now()
            WHERE account_id = $3
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(changes.display_name)
        .bind(changes.login_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique)?
        .ok_or(StoreError::NotFound)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE staff_account
            SET password_hash = $1, updated_at = now()
            WHERE account_id = $2
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Accounts kept in process memory, for the demo backend and tests.
#[derive(Default)]
pub struct MemoryAccountStore {
    rows: RwLock<Vec<AccountRow>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<AccountRow>> {
        self.rows.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<AccountRow>> {
        self.rows.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub fn set_active(&self, id: Uuid, active: bool) {
        if let Some(row) = self.write().iter_mut().find(|r| r.account_id == id) {
            row.is_active = active;
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_login_id(&self, login_id: &str) -> Result<Option<AccountRow>, StoreError> {
        Ok(self.read().iter().find(|r| r.login_id == login_id).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccountRow>, StoreError> {
        Ok(self.read().iter().find(|r| r.account_id == id).cloned())
    }

    async fn insert(&self, new: NewAccount) -> Result<AccountRow, StoreError> {
        let mut rows = self.write();
        if rows.iter().any(|r| r.login_id == new.login_id) {
            return Err(StoreError::Duplicate("loginId"));
        }
        let now = Utc::now();
        let row = AccountRow {
            account_id: Uuid::new_v4(),
            display_name: new.display_name,
            login_id: new.login_id,
            password_hash: new.password_hash,
            is_active: true,
            is_admin: new.is_admin,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut rows = self.write();
        let row = rows.iter_mut().find(|r| r.account_id == id).ok_or(StoreError::NotFound)?;
        row.last_login_at = Some(at);
        row.updated_at = at;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<AccountRow, StoreError> {
        let mut rows = self.write();
        if let Some(login_id) = &changes.login_id {
            if rows.iter().any(|r| &r.login_id == login_id && r.account_id != id) {
                return Err(StoreError::Duplicate("loginId"));
            }
        }
        let row = rows.iter_mut().find(|r| r.account_id == id).ok_or(StoreError::NotFound)?;
        if let Some(name) = changes.display_name {
            row.display_name = name;
        }
        if let Some(login_id) = changes.login_id {
            row.login_id = login_id;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), StoreError> {
        let mut rows = self.write();
        let row = rows.iter_mut().find(|r| r.account_id == id).ok_or(StoreError::NotFound)?;
        row.password_hash = password_hash;
        row.updated_at = Utc::now();
        Ok(())
    }
}
