//! Signed access and password-reset tokens.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use livenest_common::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Shared token service handle.
pub type TokenServiceRef = Arc<dyn TokenService>;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    PasswordReset,
}

/// Claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// User role at issuance
    pub role: String,
    pub purpose: TokenPurpose,
    /// Digest of the credential the token is bound to; a password change voids it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Claims for `user_id`; timestamps are filled in by [`TokenService::issue`].
    #[must_use]
    pub fn new(user_id: &str, role: &str, purpose: TokenPurpose) -> Self {
        Self {
            sub: user_id.to_string(),
            role: role.to_string(),
            purpose,
            fingerprint: None,
            iat: 0,
            exp: 0,
        }
    }

    /// Bind the token to a credential fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: String) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }
}

/// Short digest of a password hash, safe to embed in a token.
#[must_use]
pub fn credential_fingerprint(password_hash: &str) -> String {
    let digest = Sha256::digest(password_hash.as_bytes());
    hex::encode(&digest[..16])
}

/// Issues and verifies signed tokens.
pub trait TokenService: Send + Sync {
    /// Sign `claims`, valid for `ttl` from now.
    fn issue(&self, claims: Claims, ttl: Duration) -> AppResult<String>;

    /// Verify signature and expiry. Any failure is `Unauthorized`.
    fn verify(&self, token: &str) -> AppResult<Claims>;
}

/// HS256 JWT token service.
#[derive(Clone)]
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtTokenService {
    /// Create a token service from a shared secret.
    pub fn new(secret: &str) -> AppResult<Self> {
        if secret.len() < 16 {
            return Err(AppError::Config(
                "auth.jwt_secret must be at least 16 bytes".to_string(),
            ));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, mut claims: Claims, ttl: Duration) -> AppResult<String> {
        let now = Utc::now();
        claims.iat = now.timestamp();
        claims.exp = (now + ttl).timestamp();

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                AppError::Unauthorized
            })
    }
}
