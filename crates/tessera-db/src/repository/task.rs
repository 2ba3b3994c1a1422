//! SurrealDB implementation of [`TaskRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::TesseraResult;
use tessera_core::models::project::ProjectRole;
use tessera_core::models::task::{CreateTask, Task, TaskAccess, TaskStatus};
use tessera_core::models::workspace::WorkspaceRole;
use tessera_core::repository::TaskRepository;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TaskRow {
    project_id: String,
    title: String,
    description: Option<String>,
    status: String,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct TaskRefRow {
    project_id: String,
    created_by: Option<String>,
}

#[derive(Debug, SurrealValue)]
struct WorkspaceIdRow {
    workspace_id: String,
}

#[derive(Debug, SurrealValue)]
struct RoleRow {
    role: String,
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

impl TaskRow {
    fn into_task(self, id: Uuid) -> Result<Task, DbError> {
        let status = TaskStatus::parse(&self.status)
            .ok_or_else(|| DbError::Decode(format!("unknown task status: {}", self.status)))?;
        Ok(Task {
            id,
            project_id: parse_uuid(&self.project_id, "project")?,
            title: self.title,
            description: self.description,
            status,
            created_by: self
                .created_by
                .map(|s| parse_uuid(&s, "creator"))
                .transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the task repository.
#[derive(Clone)]
pub struct SurrealTaskRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTaskRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Project id + creator for a task; `NotFound` when absent.
    async fn task_ref(&self, task_id: Uuid) -> TesseraResult<TaskRefRow> {
        let id_str = task_id.to_string();

        let mut result = self
            .db
            .query("SELECT project_id, created_by FROM type::record('task', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TaskRefRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "task".into(),
            id: id_str,
        })?)
    }

    async fn project_workspace_id(&self, project_id: &str) -> TesseraResult<String> {
        let mut result = self
            .db
            .query("SELECT workspace_id FROM type::record('project', $id)")
            .bind(("id", project_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<WorkspaceIdRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "project".into(),
            id: project_id.to_string(),
        })?;
        Ok(row.workspace_id)
    }
}

impl<C: Connection> TaskRepository for SurrealTaskRepository<C> {
    async fn create(&self, input: CreateTask) -> TesseraResult<Task> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.db
            .query(
                "CREATE type::record('task', $id) SET \
                 project_id = $project_id, \
                 title = $title, \
                 description = $description, \
                 status = 'TODO', \
                 created_by = $created_by, \
                 created_at = $now, \
                 updated_at = $now",
            )
            .bind(("id", id.to_string()))
            .bind(("project_id", input.project_id.to_string()))
            .bind(("title", input.title.clone()))
            .bind(("description", input.description.clone()))
            .bind(("created_by", input.created_by.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(Task {
            id,
            project_id: input.project_id,
            title: input.title,
            description: input.description,
            status: TaskStatus::Todo,
            created_by: Some(input.created_by),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> TesseraResult<Task> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('task', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TaskRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "task".into(),
            id: id_str,
        })?;

        row.into_task(id).map_err(Into::into)
    }

    async fn workspace_id_of(&self, task_id: Uuid) -> TesseraResult<Uuid> {
        let task = self.task_ref(task_id).await?;
        let workspace_id = self.project_workspace_id(&task.project_id).await?;
        parse_uuid(&workspace_id, "workspace").map_err(Into::into)
    }

    async fn access_context(&self, task_id: Uuid, user_id: Uuid) -> TesseraResult<TaskAccess> {
        let task = self.task_ref(task_id).await?;
        let workspace_id = self.project_workspace_id(&task.project_id).await?;

        let mut result = self
            .db
            .query(
                "SELECT role FROM project_member \
                 WHERE project_id = $project_id AND user_id = $user_id; \
                 SELECT role FROM workspace_member \
                 WHERE workspace_id = $workspace_id AND user_id = $user_id;",
            )
            .bind(("project_id", task.project_id.clone()))
            .bind(("workspace_id", workspace_id))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let project_rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let workspace_rows: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;

        let project_role = project_rows
            .first()
            .map(|r| {
                ProjectRole::parse(&r.role)
                    .ok_or_else(|| DbError::Decode(format!("unknown project role: {}", r.role)))
            })
            .transpose()?;
        let workspace_role = workspace_rows
            .first()
            .map(|r| {
                WorkspaceRole::parse(&r.role)
                    .ok_or_else(|| DbError::Decode(format!("unknown workspace role: {}", r.role)))
            })
            .transpose()?;

        Ok(TaskAccess {
            created_by: task
                .created_by
                .as_deref()
                .map(|s| parse_uuid(s, "creator"))
                .transpose()?,
            project_role,
            workspace_role,
        })
    }
}
