//! Password hashing and strength checking using Argon2id.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::config::PasswordPolicy;
use crate::error::AuthError;

fn argon2() -> Result<Argon2<'static>, AuthError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19_456, 2, 1, None)
        .map_err(|e| AuthError::Crypto(format!("argon2 params error: {e}")))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash a password with Argon2id. The salt is randomly generated for
/// each call, so two hashes of the same password never compare equal.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Crypto(format!("hashing failed: {e}")))
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match argon2()?.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Result of a strength check: every violated rule, not just the first.
#[derive(Debug, Clone)]
pub struct StrengthReport {
    pub valid: bool,
    pub violations: Vec<String>,
}

impl PasswordPolicy {
    /// Check a candidate password against the policy.
    pub fn check(&self, password: &str) -> StrengthReport {
        let mut violations = Vec::new();

        if password.chars().count() < self.min_length {
            violations.push(format!(
                "must be at least {} characters long",
                self.min_length
            ));
        }
        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push("must contain at least one uppercase letter".into());
        }
        if !password.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push("must contain at least one lowercase letter".into());
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push("must contain at least one number".into());
        }
        if self.require_special && password.chars().all(|c| c.is_ascii_alphanumeric()) {
            violations.push("must contain at least one special character".into());
        }

        StrengthReport {
            valid: violations.is_empty(),
            violations,
        }
    }
}
