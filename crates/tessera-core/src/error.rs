//! Error types for the Tessera system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TesseraError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    /// Missing, malformed or expired access credentials — distinct from
    /// [`TesseraError::Forbidden`], which means the caller is known but
    /// lacks the required role.
    #[error("Authentication required: {reason}")]
    Unauthenticated { reason: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// Login failure. Deliberately carries no detail: unknown email and
    /// wrong password must be indistinguishable to the caller.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account has been banned")]
    AccountBanned,

    /// Refresh or reset token rejected: bad signature, expired, unknown,
    /// already consumed or revoked.
    #[error("invalid or expired token: {reason}")]
    InvalidToken { reason: String },

    /// A role change would leave the workspace with zero owners.
    #[error("cannot demote the only workspace owner; promote another owner first")]
    LastOwner,

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type TesseraResult<T> = Result<T, TesseraError>;
