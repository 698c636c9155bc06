//! Authentication: password hashing, bearer tokens and the request extractor.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use snaphunt_core::UserId;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

const TOKEN_REQUIRED: &str = "Auth token is required";
const TOKEN_INVALID: &str = "Invalid or expired token";

/// Token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user
    #[serde(rename = "userId")]
    pub user_id: UserId,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

/// Issues and checks tokens and password hashes.
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expires_in_secs: i64,
    password_cost: u32,
}

impl AuthService {
    /// Create a service signing with `secret` (HS256).
    pub fn new(secret: &str, expires_in_secs: i64, password_cost: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            expires_in_secs,
            password_cost,
        }
    }

    /// Token lifetime in seconds.
    pub fn expires_in_secs(&self) -> i64 {
        self.expires_in_secs
    }

    /// Sign a token for `user`.
    pub fn issue_token(&self, user: UserId) -> Result<String, ApiError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            user_id: user,
            iat,
            exp: iat + self.expires_in_secs,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }

    /// Check a token and return its user.
    pub fn verify_token(&self, token: &str) -> Result<UserId, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.user_id)
            .map_err(|e| {
                debug!(error = %e, "Rejected token");
                ApiError::Unauthorized(TOKEN_INVALID.to_string())
            })
    }

    /// Hash a password off the async runtime.
    pub async fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        let password = password.to_string();
        let cost = self.password_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
            .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))
    }

    /// Compare a password against a stored hash off the async runtime.
    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ApiError> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
            .map_err(|e| ApiError::Internal(format!("failed to verify password: {e}")))
    }
}

/// The user a request was authenticated as.
///
/// Extracting it rejects the request with 401 unless it carries a valid
/// `Authorization: Bearer <token>` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized(TOKEN_REQUIRED.to_string()))?;

        state.auth.verify_token(token).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let auth = AuthService::new("secret", 60, 4);
        let token = auth.issue_token(UserId(7)).unwrap();
        assert_eq!(auth.verify_token(&token).unwrap(), UserId(7));
    }

    #[test]
    fn test_token_rejects_other_secret() {
        let issuer = AuthService::new("secret", 60, 4);
        let other = AuthService::new("another", 60, 4);
        let token = issuer.issue_token(UserId(1)).unwrap();

        let err = other.verify_token(&token).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == TOKEN_INVALID));
        assert!(issuer.verify_token("not-a-token").is_err());
    }

    #[test]
    fn test_expired_token() {
        // Past the default 60s leeway.
        let auth = AuthService::new("secret", -120, 4);
        let token = auth.issue_token(UserId(1)).unwrap();
        assert!(auth.verify_token(&token).is_err());
    }

    #[tokio::test]
    async fn test_password_hashing() {
        let auth = AuthService::new("secret", 60, 4);
        let hash = auth.hash_password("correct horse").await.unwrap();
        assert_ne!(hash, "correct horse");
        assert!(auth.verify_password("correct horse", &hash).await.unwrap());
        assert!(!auth.verify_password("wrong horse", &hash).await.unwrap());
    }
}
