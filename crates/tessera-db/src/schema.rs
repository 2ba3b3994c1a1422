//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Revocation is a nullable
//! `revoked_at` datetime on both device and refresh_token.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD full_name ON TABLE user TYPE option<string>;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['USER', 'ADMIN'];
DEFINE FIELD status ON TABLE user TYPE string \
    ASSERT $value IN ['ACTIVE', 'BANNED'];
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Devices (one per login or rotation)
-- =======================================================================
DEFINE TABLE device SCHEMAFULL;
DEFINE FIELD user_id ON TABLE device TYPE string;
DEFINE FIELD jti ON TABLE device TYPE string;
DEFINE FIELD ip_address ON TABLE device TYPE option<string>;
DEFINE FIELD user_agent ON TABLE device TYPE option<string>;
DEFINE FIELD revoked_at ON TABLE device TYPE option<datetime>;
DEFINE FIELD last_used_at ON TABLE device TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE device TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_device_jti ON TABLE device COLUMNS jti UNIQUE;
DEFINE INDEX idx_device_user ON TABLE device COLUMNS user_id;

-- =======================================================================
-- Refresh tokens (mirror a device's jti; single-use)
-- =======================================================================
DEFINE TABLE refresh_token SCHEMAFULL;
DEFINE FIELD jti ON TABLE refresh_token TYPE string;
DEFINE FIELD user_id ON TABLE refresh_token TYPE string;
DEFINE FIELD device_id ON TABLE refresh_token TYPE string;
DEFINE FIELD expires_at ON TABLE refresh_token TYPE datetime;
DEFINE FIELD revoked_at ON TABLE refresh_token TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE refresh_token TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_refresh_token_jti ON TABLE refresh_token \
    COLUMNS jti UNIQUE;
DEFINE INDEX idx_refresh_token_user ON TABLE refresh_token \
    COLUMNS user_id;

-- =======================================================================
-- Password reset codes
-- =======================================================================
DEFINE TABLE password_reset SCHEMAFULL;
DEFINE FIELD user_id ON TABLE password_reset TYPE string;
DEFINE FIELD code_hash ON TABLE password_reset TYPE string;
DEFINE FIELD expires_at ON TABLE password_reset TYPE datetime;
DEFINE FIELD used ON TABLE password_reset TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE password_reset TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_password_reset_user ON TABLE password_reset \
    COLUMNS user_id;

-- =======================================================================
-- Workspaces
-- =======================================================================
DEFINE TABLE workspace SCHEMAFULL;
DEFINE FIELD name ON TABLE workspace TYPE string;
DEFINE FIELD created_by ON TABLE workspace TYPE option<string>;
DEFINE FIELD created_at ON TABLE workspace TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE workspace TYPE datetime \
    DEFAULT time::now();

DEFINE TABLE workspace_member SCHEMAFULL;
DEFINE FIELD workspace_id ON TABLE workspace_member TYPE string;
DEFINE FIELD user_id ON TABLE workspace_member TYPE string;
DEFINE FIELD role ON TABLE workspace_member TYPE string \
    ASSERT $value IN ['OWNER', 'MEMBER', 'VIEWER'];
DEFINE FIELD added_at ON TABLE workspace_member TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_workspace_member_pair ON TABLE workspace_member \
    COLUMNS workspace_id, user_id UNIQUE;

-- =======================================================================
-- Projects (each belongs to exactly one workspace)
-- =======================================================================
DEFINE TABLE project SCHEMAFULL;
DEFINE FIELD workspace_id ON TABLE project TYPE string;
DEFINE FIELD name ON TABLE project TYPE string;
DEFINE FIELD description ON TABLE project TYPE option<string>;
DEFINE FIELD created_by ON TABLE project TYPE option<string>;
DEFINE FIELD created_at ON TABLE project TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE project TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_project_workspace ON TABLE project \
    COLUMNS workspace_id;

DEFINE TABLE project_member SCHEMAFULL;
DEFINE FIELD project_id ON TABLE project_member TYPE string;
DEFINE FIELD user_id ON TABLE project_member TYPE string;
DEFINE FIELD role ON TABLE project_member TYPE string \
    ASSERT $value IN ['LEAD', 'CONTRIBUTOR', 'VIEWER'];
DEFINE FIELD added_at ON TABLE project_member TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_project_member_pair ON TABLE project_member \
    COLUMNS project_id, user_id UNIQUE;

-- =======================================================================
-- Tasks
-- =======================================================================
DEFINE TABLE task SCHEMAFULL;
DEFINE FIELD project_id ON TABLE task TYPE string;
DEFINE FIELD title ON TABLE task TYPE string;
DEFINE FIELD description ON TABLE task TYPE option<string>;
DEFINE FIELD status ON TABLE task TYPE string \
    ASSERT $value IN ['TODO', 'IN_PROGRESS', 'DONE'];
DEFINE FIELD created_by ON TABLE task TYPE option<string>;
DEFINE FIELD created_at ON TABLE task TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE task TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_task_project ON TABLE task COLUMNS project_id;

-- =======================================================================
-- Audit Log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD user_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD ip_address ON TABLE audit_log TYPE option<string>;
DEFINE FIELD category ON TABLE audit_log TYPE string \
    ASSERT $value IN ['USER_LOG', 'SYSTEM_LOG', 'ACTIVITY_TRACKER'];
DEFINE FIELD details ON TABLE audit_log TYPE option<object> FLEXIBLE;
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_time ON TABLE audit_log COLUMNS timestamp;
DEFINE INDEX idx_audit_user ON TABLE audit_log COLUMNS user_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn schema_defines_single_use_indexes() {
        // The jti uniqueness backs the at-most-one-live-session
        // invariant; the membership pair indexes back per-pair
        // uniqueness.
        assert!(SCHEMA_V1.contains("COLUMNS jti UNIQUE"));
        assert!(SCHEMA_V1.contains("COLUMNS workspace_id, user_id UNIQUE"));
        assert!(SCHEMA_V1.contains("COLUMNS project_id, user_id UNIQUE"));
    }
}
