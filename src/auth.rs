use argon2::{
    Argon2,
    PasswordHash,
    PasswordVerifier,
    PasswordHasher,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use argon2::password_hash::{SaltString, rand_core::OsRng as PHOsRng};

type HmacSha256 = Hmac<Sha256>;

/// Verify password using Argon2 hash stored in DB.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Hash a new password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut PHOsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| format!("argon2 hash error: {e}"))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Account id.
    pub sub: Uuid,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Expires at, unix seconds.
    pub exp: i64,
}

/// Issues and checks stateless session tokens of the form
/// `base64url(claims json) "." base64url(hmac-sha256)`.
#[derive(Clone)]
pub struct SessionSigner {
    key: Vec<u8>,
    ttl: Duration,
}

impl SessionSigner {
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            key: secret.to_vec(),
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        HmacSha256::new_from_slice(&self.key).expect("hmac key of any size")
    }

    pub fn issue(&self, account_id: Uuid, now: DateTime<Utc>) -> (String, DateTime<Utc>) {
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            sub: account_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        // Serializing a struct of plain integers and a uuid cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac();
        mac.update(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        (format!("{payload_b64}.{sig_b64}"), expires_at)
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        let (payload_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac();
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> SessionSigner {
        SessionSigner::new(b"0123456789abcdef0123456789abcdef", 24)
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn issued_token_verifies_until_expiry() {
        let s = signer();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let (token, expires_at) = s.issue(id, now);
        assert_eq!(expires_at, now + Duration::hours(24));

        let claims = s.verify(&token, now + Duration::hours(23)).unwrap();
        assert_eq!(claims.sub, id);

        assert_eq!(
            s.verify(&token, now + Duration::hours(25)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn tampered_token_is_rejected() {
        let s = signer();
        let now = Utc::now();
        let (token, _) = s.issue(Uuid::new_v4(), now);

        let (_, sig) = token.split_once('.').unwrap();
        let forged_claims = SessionClaims {
            sub: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: now.timestamp() + 3600,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{forged_payload}.{sig}");
        assert_eq!(s.verify(&forged, now), Err(TokenError::BadSignature));

        let other = SessionSigner::new(b"another-secret-another-secret-xx", 24);
        assert_eq!(other.verify(&token, now), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let s = signer();
        assert_eq!(s.verify("no-dot-here", Utc::now()), Err(TokenError::Malformed));
        assert_eq!(s.verify("abc.!!!", Utc::now()), Err(TokenError::Malformed));
    }
}
