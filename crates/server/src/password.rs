//! Argon2id password hashing plus the strength policy.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use database::PasswordPolicy;

use crate::error::{ApiError, ApiResult};

/// Hashes and verifies passwords off the async runtime.
#[derive(Clone)]
pub struct Passwords {
    argon2: Argon2<'static>,
    policy: PasswordPolicy,
}

impl Passwords {
    /// Argon2id with the library's recommended parameters.
    pub fn new(policy: PasswordPolicy) -> Self {
        Self {
            argon2: Argon2::default(),
            policy,
        }
    }

    /// Argon2id with explicit cost parameters.
    pub fn with_params(policy: PasswordPolicy, params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            policy,
        }
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    pub async fn hash(&self, password: &str) -> ApiResult<String> {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|e| ApiError::Internal(format!("password task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))
    }

    /// Returns false on a wrong password; errors only on a malformed hash.
    pub async fn verify(&self, password: &str, hash: &str) -> ApiResult<bool> {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash)?;
            match argon2.verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(|e| ApiError::Internal(format!("password task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("password verification failed: {e}")))
    }
}
