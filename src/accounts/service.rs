use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};

use crate::auth::{SessionSigner, TokenError, hash_password, verify_password};
use crate::error::StoreError;
use crate::models::AccountRow;

use super::store::{AccountStore, NewAccount, ProfileChanges};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid user ID or password.")]
    InvalidCredentials,
    #[error("Account has been deactivated. Please contact administrator.")]
    Deactivated,
    #[error("Invalid token.")]
    InvalidToken,
    #[error("Token has expired.")]
    TokenExpired,
    #[error("Token is no longer valid. User not found.")]
    AccountGone,
    #[error("Current password is incorrect.")]
    WrongCurrentPassword,
    #[error("{0}")]
    Validation(String),
    #[error("User ID is already in use.")]
    Duplicate,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(_) => AuthError::Duplicate,
            other => AuthError::Store(other),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Malformed | TokenError::BadSignature => AuthError::InvalidToken,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub login_id: Option<String>,
}

/// Checked against when the login id is unknown, so that failure costs the
/// same argon2 run as a wrong password.
static UNKNOWN_ACCOUNT_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("no-such-account").unwrap_or_default());

/// Runs the password verifier whether or not an account was found.
fn password_matches(account: Option<&AccountRow>, password: &str) -> bool {
    match account {
        Some(acc) => verify_password(password, &acc.password_hash),
        None => {
            verify_password(password, &UNKNOWN_ACCOUNT_HASH);
            false
        }
    }
}

const MIN_LOGIN_ID_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

fn validate_login_id(login_id: &str) -> Result<(), AuthError> {
    if login_id.len() < MIN_LOGIN_ID_LEN {
        return Err(AuthError::Validation(format!(
            "user ID must be at least {MIN_LOGIN_ID_LEN} characters"
        )));
    }
    if login_id.chars().any(char::is_whitespace) {
        return Err(AuthError::Validation("user ID cannot contain spaces".into()));
    }
    Ok(())
}

fn validate_display_name(name: &str) -> Result<(), AuthError> {
    if name.is_empty() {
        return Err(AuthError::Validation("name is required".into()));
    }
    if name.chars().count() > 100 {
        return Err(AuthError::Validation("name cannot be more than 100 characters".into()));
    }
    Ok(())
}

fn validate_password(pw: &str) -> Result<(), AuthError> {
    if pw.trim().len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Staff account operations over an [`AccountStore`].
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    signer: SessionSigner,
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>, signer: SessionSigner) -> Self {
        Self { store, signer }
    }

    pub async fn register(
        &self,
        display_name: &str,
        login_id: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<AccountRow, AuthError> {
        let display_name = display_name.trim();
        let login_id = login_id.trim();
        validate_display_name(display_name)?;
        validate_login_id(login_id)?;
        validate_password(password)?;

        let password_hash = hash_password(password).map_err(AuthError::Hashing)?;
        let account = self
            .store
            .insert(NewAccount {
                display_name: display_name.to_string(),
                login_id: login_id.to_string(),
                password_hash,
                is_admin,
            })
            .await?;

        tracing::info!(account_id = %account.account_id, login_id = %account.login_id, "account registered");
        Ok(account)
    }

    pub fn issue_token(&self, account: &AccountRow, now: DateTime<Utc>) -> IssuedToken {
        let (token, expires_at) = self.signer.issue(account.account_id, now);
        IssuedToken { token, expires_at }
    }

    /// Unknown login id and wrong password fail identically.
    pub async fn login(
        &self,
        login_id: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<(AccountRow, IssuedToken), AuthError> {
        let login_id = login_id.trim();
        if login_id.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Please provide user ID and password.".into(),
            ));
        }

        let found = self.store.find_by_login_id(login_id).await?;
        if !password_matches(found.as_ref(), password) {
            tracing::warn!(login_id, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }
        let Some(mut account) = found else {
            return Err(AuthError::InvalidCredentials);
        };
        // Checked after the password so a deactivated id is not revealed to guessers.
        if !account.is_active {
            return Err(AuthError::Deactivated);
        }

        self.store.record_login(account.account_id, now).await?;
        account.last_login_at = Some(now);

        let token = self.issue_token(&account, now);
        tracing::info!(account_id = %account.account_id, "login succeeded");
        Ok((account, token))
    }

    pub async fn validate_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccountRow, AuthError> {
        let claims = self.signer.verify(token, now)?;
        let account = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::AccountGone)?;

        if !account.is_active {
            return Err(AuthError::Deactivated);
        }
        Ok(account)
    }

    pub async fn change_password(
        &self,
        account: &AccountRow,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::Validation(
                "Please provide current password and new password.".into(),
            ));
        }
        if !verify_password(current_password, &account.password_hash) {
            return Err(AuthError::WrongCurrentPassword);
        }
        validate_password(new_password)?;

        let password_hash = hash_password(new_password).map_err(AuthError::Hashing)?;
        self.store
            .set_password_hash(account.account_id, password_hash)
            .await?;

        tracing::info!(account_id = %account.account_id, "password changed");
        Ok(())
    }

    pub async fn update_profile(
        &self,
        account: &AccountRow,
        update: ProfileUpdate,
    ) -> Result<AccountRow, AuthError> {
        let display_name = update
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let login_id = update
            .login_id
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty() && *l != account.login_id);

        if let Some(name) = &display_name {
            validate_display_name(name)?;
        }
        if let Some(new_login) = &login_id {
            validate_login_id(new_login)?;
            if let Some(other) = self.store.find_by_login_id(new_login).await? {
                if other.account_id != account.account_id {
                    return Err(AuthError::Duplicate);
                }
            }
        }

        let updated = self
            .store
            .update_profile(account.account_id, ProfileChanges { display_name, login_id })
            .await?;
        Ok(updated)
    }
}
