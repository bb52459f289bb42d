use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::fmt;

use crate::services::ServiceError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Clear-text password. `Debug` is redacted so it never reaches the logs.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// argon2id PHC string as stored on the user document.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash with argon2id default parameters and a fresh random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?
        .to_string();

    Ok(PasswordHashString::new(hash))
}

/// Returns `Ok(false)` on a mismatch. A malformed stored hash is an internal error.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(password_hash.as_str()).map_err(|e| {
        ServiceError::Internal(anyhow::anyhow!("Invalid password hash format: {}", e))
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed)
        .is_ok())
}
