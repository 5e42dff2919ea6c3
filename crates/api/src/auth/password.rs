//! Argon2id password hashing and the password-change rules.
//!
//! Hashes are stored in PHC string format so the salt and parameters travel
//! with the hash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use keystone_core::error::CoreError;

use crate::error::AppError;

/// Hash a plaintext password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))
}

/// Verify a plaintext password against a stored PHC hash.
///
/// A hash that cannot be parsed never verifies.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("Stored password hash is not a valid PHC string");
        return Ok(false);
    };
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::InternalError(format!(
            "Password verification error: {e}"
        ))),
    }
}

/// Rules for a self-service password change, checked after the old password
/// has been verified.
pub fn check_new_password(old: &str, new: &str, init_password: &str) -> Result<(), CoreError> {
    if new == old {
        return Err(CoreError::Validation(
            "The new password must differ from the old one".into(),
        ));
    }
    if new == init_password {
        return Err(CoreError::Validation(
            "The new password cannot be the initial password".into(),
        ));
    }
    Ok(())
}
