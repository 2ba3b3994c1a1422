//! SurrealDB-backed audit sink.
//!
//! Every entry is also emitted as a `tracing` event, so operators get
//! the security trail in the structured log stream even when the
//! database write fails. Failed writes are demoted to warnings —
//! auditing is fire-and-forget by contract.

use serde_json::Value;
use surrealdb::{Connection, Surreal};
use tessera_core::models::audit::AuditEntry;
use tessera_core::repository::AuditLog;

/// Append-only audit sink writing to the `audit_log` table.
#[derive(Clone)]
pub struct SurrealAuditLog<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLog<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLog for SurrealAuditLog<C> {
    async fn record(&self, entry: AuditEntry) {
        tracing::info!(
            action = %entry.action,
            user_id = ?entry.user_id,
            ip_address = ?entry.ip_address,
            category = entry.category.as_str(),
            "audit event"
        );

        let details = match entry.details {
            Value::Null => None,
            other => Some(other),
        };

        let result = self
            .db
            .query(
                "CREATE audit_log SET \
                 action = $action, \
                 user_id = $user_id, \
                 ip_address = $ip_address, \
                 category = $category, \
                 details = $details",
            )
            .bind(("action", entry.action))
            .bind(("user_id", entry.user_id.map(|id| id.to_string())))
            .bind(("ip_address", entry.ip_address))
            .bind(("category", entry.category.as_str().to_string()))
            .bind(("details", details))
            .await;

        match result {
            Ok(response) => {
                if let Err(e) = response.check() {
                    tracing::warn!(error = %e, "failed to write audit log entry");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to write audit log entry");
            }
        }
    }
}
