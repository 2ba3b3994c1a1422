//! SurrealDB implementation of [`WorkspaceRepository`].
//!
//! The owner-floor invariant ("a workspace always retains at least one
//! OWNER") is enforced inside the mutating transactions: demotions and
//! removals recount the owners in-query and abort when the target is
//! the last one, so two racing demotions cannot both pass.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::workspace::{Workspace, WorkspaceMembership, WorkspaceRole};
use tessera_core::repository::WorkspaceRepository;
use uuid::Uuid;

use crate::error::{DbError, check_sentinels};

#[derive(Debug, SurrealValue)]
struct WorkspaceRow {
    name: String,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct WorkspaceRowWithId {
    record_id: String,
    name: String,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct MemberRow {
    workspace_id: String,
    user_id: String,
    role: String,
    added_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct UserIdRow {
    user_id: String,
}

fn parse_role(s: &str) -> Result<WorkspaceRole, DbError> {
    WorkspaceRole::parse(s).ok_or_else(|| DbError::Decode(format!("unknown workspace role: {s}")))
}

fn parse_created_by(created_by: Option<String>) -> Result<Option<Uuid>, DbError> {
    created_by
        .map(|s| {
            Uuid::parse_str(&s).map_err(|e| DbError::Decode(format!("invalid creator UUID: {e}")))
        })
        .transpose()
}

impl WorkspaceRow {
    fn into_workspace(self, id: Uuid) -> Result<Workspace, DbError> {
        Ok(Workspace {
            id,
            name: self.name,
            created_by: parse_created_by(self.created_by)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl WorkspaceRowWithId {
    fn try_into_workspace(self) -> Result<Workspace, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        Ok(Workspace {
            id,
            name: self.name,
            created_by: parse_created_by(self.created_by)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl MemberRow {
    fn try_into_membership(self) -> Result<WorkspaceMembership, DbError> {
        let workspace_id = Uuid::parse_str(&self.workspace_id)
            .map_err(|e| DbError::Decode(format!("invalid workspace UUID: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| DbError::Decode(format!("invalid user UUID: {e}")))?;
        Ok(WorkspaceMembership {
            workspace_id,
            user_id,
            role: parse_role(&self.role)?,
            added_at: self.added_at,
        })
    }
}

/// SurrealDB implementation of the workspace repository.
#[derive(Clone)]
pub struct SurrealWorkspaceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealWorkspaceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> WorkspaceRepository for SurrealWorkspaceRepository<C> {
    async fn create(&self, name: String, created_by: Uuid) -> TesseraResult<Workspace> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('workspace', $id) SET \
                     name = $name, \
                     created_by = $created_by, \
                     created_at = $now, \
                     updated_at = $now; \
                 CREATE workspace_member SET \
                     workspace_id = $id, \
                     user_id = $created_by, \
                     role = 'OWNER', \
                     added_at = $now; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("name", name.clone()))
            .bind(("created_by", created_by.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(Workspace {
            id,
            name,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> TesseraResult<Workspace> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('workspace', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<WorkspaceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "workspace".into(),
            id: id_str,
        })?;

        row.into_workspace(id).map_err(Into::into)
    }

    async fn get_membership(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> TesseraResult<Option<WorkspaceMembership>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM workspace_member \
                 WHERE workspace_id = $workspace_id AND user_id = $user_id",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MemberRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.try_into_membership().map_err(TesseraError::from))
            .transpose()
    }

    async fn add_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> TesseraResult<()> {
        // Existing membership rows are left untouched.
        if self.get_membership(workspace_id, user_id).await?.is_some() {
            return Ok(());
        }

        self.db
            .query(
                "CREATE workspace_member SET \
                 workspace_id = $workspace_id, \
                 user_id = $user_id, \
                 role = $role, \
                 added_at = time::now()",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("role", role.as_str().to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn update_member_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> TesseraResult<()> {
        let user_id_str = user_id.to_string();

        let mut resp = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $owners = (SELECT user_id FROM workspace_member \
                     WHERE workspace_id = $workspace_id AND role = 'OWNER'); \
                 IF $role != 'OWNER' \
                     AND array::len($owners) == 1 \
                     AND $owners[0].user_id == $user_id \
                     { THROW 'LAST_OWNER'; }; \
                 LET $updated = (UPDATE workspace_member SET role = $role \
                     WHERE workspace_id = $workspace_id AND user_id = $user_id); \
                 IF array::len($updated) == 0 { THROW 'ROW_MISSING'; }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .bind(("user_id", user_id_str.clone()))
            .bind(("role", role.as_str().to_string()))
            .await
            .map_err(DbError::from)?;
        check_sentinels(&mut resp, "workspace_member", &user_id_str)?;

        Ok(())
    }

    async fn remove_member(&self, workspace_id: Uuid, user_id: Uuid) -> TesseraResult<()> {
        let user_id_str = user_id.to_string();

        // Removal is subject to the same owner floor as a demotion,
        // and also drops the user's memberships in the workspace's
        // projects.
        let mut resp = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $owners = (SELECT user_id FROM workspace_member \
                     WHERE workspace_id = $workspace_id AND role = 'OWNER'); \
                 IF array::len($owners) == 1 AND $owners[0].user_id == $user_id \
                     { THROW 'LAST_OWNER'; }; \
                 DELETE workspace_member \
                     WHERE workspace_id = $workspace_id AND user_id = $user_id; \
                 DELETE project_member \
                     WHERE user_id = $user_id AND project_id IN \
                         (SELECT VALUE meta::id(id) FROM project \
                          WHERE workspace_id = $workspace_id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .bind(("user_id", user_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        check_sentinels(&mut resp, "workspace_member", &user_id_str)?;

        Ok(())
    }

    async fn owners(&self, workspace_id: Uuid) -> TesseraResult<Vec<Uuid>> {
        let mut result = self
            .db
            .query(
                "SELECT user_id FROM workspace_member \
                 WHERE workspace_id = $workspace_id AND role = 'OWNER'",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserIdRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| {
                Uuid::parse_str(&row.user_id)
                    .map_err(|e| DbError::Decode(format!("invalid user UUID: {e}")).into())
            })
            .collect()
    }

    async fn list_for_user(&self, user_id: Uuid) -> TesseraResult<Vec<Workspace>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM workspace \
                 WHERE meta::id(id) IN \
                     (SELECT VALUE workspace_id FROM workspace_member \
                      WHERE user_id = $user_id) \
                 ORDER BY created_at DESC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<WorkspaceRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| row.try_into_workspace().map_err(TesseraError::from))
            .collect()
    }
}
