//! Authentication error types.

use tessera_core::error::TesseraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Uniform for unknown email and wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("current password is incorrect")]
    InvalidCurrentPassword,

    #[error("account has been banned")]
    AccountBanned,

    #[error("missing bearer token")]
    TokenMissing,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("invalid or expired reset code")]
    ResetCodeInvalid,

    #[error("password does not meet requirements: {}", .0.join("; "))]
    WeakPassword(Vec<String>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for TesseraError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidCurrentPassword => {
                TesseraError::InvalidCredentials
            }
            AuthError::AccountBanned => TesseraError::AccountBanned,
            // Access-token failures are an authentication problem at the
            // request boundary; refresh/reset flows re-map explicitly to
            // `InvalidToken` where that is the contract.
            AuthError::TokenMissing | AuthError::TokenExpired => TesseraError::Unauthenticated {
                reason: err.to_string(),
            },
            AuthError::TokenInvalid(reason) => TesseraError::Unauthenticated { reason },
            AuthError::ResetCodeInvalid => TesseraError::InvalidToken {
                reason: err.to_string(),
            },
            AuthError::WeakPassword(_) => TesseraError::Validation {
                message: err.to_string(),
            },
            AuthError::Config(msg) => TesseraError::Internal(msg),
            AuthError::Crypto(msg) => TesseraError::Crypto(msg),
        }
    }
}
