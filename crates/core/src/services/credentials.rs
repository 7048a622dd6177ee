//! Password hashing.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use livenest_common::{AppError, AppResult};

/// Shared credential service handle.
pub type CredentialServiceRef = Arc<dyn CredentialService>;

/// Hashes and verifies passwords.
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// Hash a password into a self-describing digest.
    async fn hash(&self, password: &str) -> AppResult<String>;

    /// Check a password against a digest produced by [`Self::hash`].
    async fn verify(&self, password: &str, digest: &str) -> AppResult<bool>;
}

/// Argon2id credentials, computed on the blocking thread pool.
#[derive(Clone, Default)]
pub struct Argon2Credentials;

impl Argon2Credentials {
    /// Create a new Argon2 credential service.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CredentialService for Argon2Credentials {
    async fn hash(&self, password: &str) -> AppResult<String> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Hashing task failed: {e}")))?
    }

    async fn verify(&self, password: &str, digest: &str) -> AppResult<bool> {
        let password = password.to_owned();
        let digest = digest.to_owned();
        tokio::task::spawn_blocking(move || verify_password(&password, &digest))
            .await
            .map_err(|e| AppError::Internal(format!("Hashing task failed: {e}")))?
    }
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

fn verify_password(password: &str, digest: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(digest).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
