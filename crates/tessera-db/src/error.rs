//! Database-specific error types and conversions.
//!
//! Transactions that re-check a precondition in-query abort with a
//! `THROW`n sentinel; [`map_query_error`] translates those back into
//! the typed domain errors.

use tessera_core::error::TesseraError;

/// Sentinel thrown when a refresh token was already redeemed.
pub(crate) const TOKEN_CONSUMED: &str = "TOKEN_CONSUMED";
/// Sentinel thrown when a role change would zero a workspace's owners.
pub(crate) const LAST_OWNER: &str = "LAST_OWNER";
/// Sentinel thrown when no live reset code matched.
pub(crate) const CODE_INVALID: &str = "CODE_INVALID";
/// Sentinel thrown when a targeted row was absent inside a transaction.
pub(crate) const ROW_MISSING: &str = "ROW_MISSING";

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Row mapping failed: {0}")]
    Decode(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<DbError> for TesseraError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => TesseraError::NotFound { entity, id },
            other => TesseraError::Database(other.to_string()),
        }
    }
}

/// Map a failed query/transaction to a domain error, recognizing the
/// precondition sentinels.
pub(crate) fn map_query_error(err: surrealdb::Error, entity: &str, id: &str) -> TesseraError {
    map_query_message(&err.to_string(), entity, id)
}

/// Inspect every statement error on a response, recognizing the
/// precondition sentinels. `Response::check` surfaces only the first
/// statement's generic "failed transaction" error, which hides the
/// sentinel `THROW`n on a later statement; draining `take_errors`
/// recovers it.
pub(crate) fn check_sentinels(
    resp: &mut surrealdb::Response,
    entity: &str,
    id: &str,
) -> Result<(), TesseraError> {
    let errors = resp.take_errors();
    if errors.is_empty() {
        return Ok(());
    }
    let combined = errors
        .into_values()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    Err(map_query_message(&combined, entity, id))
}

/// Shared sentinel-recognizing mapping over an error message string.
fn map_query_message(msg: &str, entity: &str, id: &str) -> TesseraError {
    if msg.contains(TOKEN_CONSUMED) {
        TesseraError::InvalidToken {
            reason: "refresh token has been revoked".into(),
        }
    } else if msg.contains(LAST_OWNER) {
        TesseraError::LastOwner
    } else if msg.contains(CODE_INVALID) {
        TesseraError::InvalidToken {
            reason: "invalid or expired reset code".into(),
        }
    } else if msg.contains(ROW_MISSING) {
        TesseraError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    } else {
        DbError::Query(msg.to_string()).into()
    }
}
