//! Password hashing.

use std::sync::Arc;

use argon2::password_hash::{
    Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::config::Argon2 as ArgonConfig;

/// Verified against when a login names an unknown user.
const DUMMY_PASSWORD: &str = "dummy password used for timing";

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Password manager that uses Argon2id and PHC string format for hashing and
/// verification.
///
/// Argon2 is CPU bound: async callers go through [`PasswordManager::hash`]
/// and [`PasswordManager::verify`], which run on the blocking pool.
pub struct PasswordManager {
    params: Params,
    dummy_hash: String,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        let mut manager = Self {
            params,
            dummy_hash: String::default(),
        };
        manager.dummy_hash = manager.hash_password(DUMMY_PASSWORD)?;

        Ok(manager)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_ref(), &salt)
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify password against a PHC.
    ///
    /// A mismatch is `Ok(false)`; an unreadable PHC string is an error.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        phc_hash: &str,
    ) -> Result<bool> {
        let parsed = PasswordHash::new(phc_hash)
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        match self.argon2().verify_password(password.as_ref(), &parsed) {
            Ok(()) => Ok(true),
            Err(HashError::Password) => Ok(false),
            Err(err) => Err(CryptoError::Argon2(err.to_string())),
        }
    }

    /// Hash `password` on the blocking pool.
    pub async fn hash(self: &Arc<Self>, password: String) -> Result<String> {
        let manager = Arc::clone(self);
        tokio::task::spawn_blocking(move || manager.hash_password(password)).await?
    }

    /// Verify `password` against `phc_hash` on the blocking pool.
    pub async fn verify(self: &Arc<Self>, password: String, phc_hash: String) -> Result<bool> {
        let manager = Arc::clone(self);
        tokio::task::spawn_blocking(move || manager.verify_password(password, &phc_hash))
            .await?
    }

    /// Spend the time of a real verification, for unknown users.
    pub async fn verify_dummy(self: &Arc<Self>, password: String) {
        let phc_hash = self.dummy_hash.clone();
        if let Err(err) = self.verify(password, phc_hash).await {
            tracing::warn!(error = %err, "dummy password verification failed");
        }
    }
}

#[cfg(test)]
pub(crate) fn fast_config() -> ArgonConfig {
    ArgonConfig {
        memory_cost: 64,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    }
}
