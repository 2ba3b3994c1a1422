//! SurrealDB implementation of [`ProjectRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::project::{CreateProject, Project, ProjectMembership, ProjectRole};
use tessera_core::repository::ProjectRepository;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ProjectRow {
    workspace_id: String,
    name: String,
    description: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct MemberRow {
    project_id: String,
    user_id: String,
    role: String,
    added_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct WorkspaceIdRow {
    workspace_id: String,
}

fn parse_role(s: &str) -> Result<ProjectRole, DbError> {
    ProjectRole::parse(s).ok_or_else(|| DbError::Decode(format!("unknown project role: {s}")))
}

impl ProjectRow {
    fn into_project(self, id: Uuid) -> Result<Project, DbError> {
        let workspace_id = Uuid::parse_str(&self.workspace_id)
            .map_err(|e| DbError::Decode(format!("invalid workspace UUID: {e}")))?;
        let created_by = self
            .created_by
            .map(|s| {
                Uuid::parse_str(&s)
                    .map_err(|e| DbError::Decode(format!("invalid creator UUID: {e}")))
            })
            .transpose()?;
        Ok(Project {
            id,
            workspace_id,
            name: self.name,
            description: self.description,
            created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl MemberRow {
    fn try_into_membership(self) -> Result<ProjectMembership, DbError> {
        let project_id = Uuid::parse_str(&self.project_id)
            .map_err(|e| DbError::Decode(format!("invalid project UUID: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| DbError::Decode(format!("invalid user UUID: {e}")))?;
        Ok(ProjectMembership {
            project_id,
            user_id,
            role: parse_role(&self.role)?,
            added_at: self.added_at,
        })
    }
}

/// SurrealDB implementation of the project repository.
#[derive(Clone)]
pub struct SurrealProjectRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealProjectRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ProjectRepository for SurrealProjectRepository<C> {
    async fn create(&self, input: CreateProject) -> TesseraResult<Project> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('project', $id) SET \
                     workspace_id = $workspace_id, \
                     name = $name, \
                     description = $description, \
                     created_by = $created_by, \
                     created_at = $now, \
                     updated_at = $now; \
                 CREATE project_member SET \
                     project_id = $id, \
                     user_id = $created_by, \
                     role = 'LEAD', \
                     added_at = $now; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("workspace_id", input.workspace_id.to_string()))
            .bind(("name", input.name.clone()))
            .bind(("description", input.description.clone()))
            .bind(("created_by", input.created_by.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(Project {
            id,
            workspace_id: input.workspace_id,
            name: input.name,
            description: input.description,
            created_by: Some(input.created_by),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> TesseraResult<Project> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('project', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ProjectRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "project".into(),
            id: id_str,
        })?;

        row.into_project(id).map_err(Into::into)
    }

    async fn get_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> TesseraResult<Option<ProjectMembership>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM project_member \
                 WHERE project_id = $project_id AND user_id = $user_id",
            )
            .bind(("project_id", project_id.to_string()))
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
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> TesseraResult<()> {
        if self.get_membership(project_id, user_id).await?.is_some() {
            return Ok(());
        }

        self.db
            .query(
                "CREATE project_member SET \
                 project_id = $project_id, \
                 user_id = $user_id, \
                 role = $role, \
                 added_at = time::now()",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("role", role.as_str().to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn workspace_id_of(&self, project_id: Uuid) -> TesseraResult<Uuid> {
        let id_str = project_id.to_string();

        let mut result = self
            .db
            .query("SELECT workspace_id FROM type::record('project', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<WorkspaceIdRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "project".into(),
            id: id_str,
        })?;

        Uuid::parse_str(&row.workspace_id)
            .map_err(|e| DbError::Decode(format!("invalid workspace UUID: {e}")).into())
    }
}
