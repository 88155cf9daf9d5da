//! Password hashing, verification and the acceptance policy.
//!
//! Hashes are Argon2id PHC strings with a fresh salt per password. The policy
//! applies at creation/reset time, not at login.

use anyhow::Result;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;

const MIN_PASSWORD_LENGTH: usize = 12;
const PASSWORD_SYMBOLS: &str = r#"!@#$%^&*(),.?":{}|<>-_=+[]\;'/`~"#;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| anyhow::anyhow!("failed to hash password"))?
        .to_string();
    Ok(hash)
}

/// Verify a presented password against a stored hash.
///
/// Returns `false` for a malformed stored hash rather than erroring; the
/// caller treats both as a failed verification. The comparison inside argon2
/// is constant-time. The secret is never logged.
#[must_use]
pub fn verify_password(stored_hash: &str, presented: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(presented.as_bytes(), &parsed)
        .is_ok()
}

/// Validate password complexity. Returns the reason on rejection.
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.is_empty() {
        return Err("Password is required");
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 12 characters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number");
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err("Password must contain at least one special character");
    }
    Ok(())
}
