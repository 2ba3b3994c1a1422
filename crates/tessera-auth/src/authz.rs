//! Authorization service — resolves a principal's effective role at
//! global, workspace and project scope and enforces role-gated
//! operations.
//!
//! Pure read-mostly decision logic: every query is scoped by explicit
//! ids, nothing here depends on ambient request state.

use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::project::{ProjectMembership, ProjectRole};
use tessera_core::models::user::GlobalRole;
use tessera_core::models::workspace::{WorkspaceMembership, WorkspaceRole};
use tessera_core::repository::{
    ProjectRepository, TaskRepository, UserRepository, WorkspaceRepository,
};
use uuid::Uuid;

/// Authorization service, generic over the repositories it consults.
pub struct AuthzService<U, W, P, T>
where
    U: UserRepository,
    W: WorkspaceRepository,
    P: ProjectRepository,
    T: TaskRepository,
{
    users: U,
    workspaces: W,
    projects: P,
    tasks: T,
}

impl<U, W, P, T> AuthzService<U, W, P, T>
where
    U: UserRepository,
    W: WorkspaceRepository,
    P: ProjectRepository,
    T: TaskRepository,
{
    pub fn new(users: U, workspaces: W, projects: P, tasks: T) -> Self {
        Self {
            users,
            workspaces,
            projects,
            tasks,
        }
    }

    // -------------------------------------------------------------------
    // Global scope
    // -------------------------------------------------------------------

    /// True when the user exists and holds the given global role.
    pub async fn has_global_role(&self, user_id: Uuid, role: GlobalRole) -> TesseraResult<bool> {
        match self.users.get_by_id(user_id).await {
            Ok(user) => Ok(user.role == role),
            Err(TesseraError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn require_admin(&self, user_id: Uuid) -> TesseraResult<()> {
        if self.has_global_role(user_id, GlobalRole::Admin).await? {
            Ok(())
        } else {
            Err(TesseraError::Forbidden {
                reason: "admin access required".into(),
            })
        }
    }

    // -------------------------------------------------------------------
    // Workspace scope
    // -------------------------------------------------------------------

    pub async fn get_workspace_membership(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> TesseraResult<Option<WorkspaceMembership>> {
        self.workspaces.get_membership(workspace_id, user_id).await
    }

    pub async fn is_workspace_member(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> TesseraResult<bool> {
        Ok(self
            .get_workspace_membership(user_id, workspace_id)
            .await?
            .is_some())
    }

    /// Fails with `Forbidden` unless the user is a member with one of
    /// the allowed roles.
    pub async fn require_workspace_role(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        allowed: &[WorkspaceRole],
    ) -> TesseraResult<WorkspaceMembership> {
        let membership = self
            .get_workspace_membership(user_id, workspace_id)
            .await?
            .ok_or_else(|| TesseraError::Forbidden {
                reason: "not a workspace member".into(),
            })?;

        if !allowed.contains(&membership.role) {
            return Err(TesseraError::Forbidden {
                reason: format!(
                    "requires one of: {}",
                    allowed
                        .iter()
                        .map(|r| r.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }

        Ok(membership)
    }

    // -------------------------------------------------------------------
    // Project scope
    // -------------------------------------------------------------------

    pub async fn get_project_membership(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> TesseraResult<Option<ProjectMembership>> {
        self.projects.get_membership(project_id, user_id).await
    }

    pub async fn is_project_member(&self, user_id: Uuid, project_id: Uuid) -> TesseraResult<bool> {
        Ok(self
            .get_project_membership(user_id, project_id)
            .await?
            .is_some())
    }

    pub async fn require_project_role(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        allowed: &[ProjectRole],
    ) -> TesseraResult<ProjectMembership> {
        let membership = self
            .get_project_membership(user_id, project_id)
            .await?
            .ok_or_else(|| TesseraError::Forbidden {
                reason: "not a project member".into(),
            })?;

        if !allowed.contains(&membership.role) {
            return Err(TesseraError::Forbidden {
                reason: format!(
                    "requires one of: {}",
                    allowed
                        .iter()
                        .map(|r| r.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }

        Ok(membership)
    }

    /// True when the user is a direct project member OR a member of
    /// the project's owning workspace — workspace membership implies
    /// read access to all of its projects.
    pub async fn can_access_project(&self, user_id: Uuid, project_id: Uuid) -> TesseraResult<bool> {
        if self.is_project_member(user_id, project_id).await? {
            return Ok(true);
        }

        let workspace_id = match self.projects.workspace_id_of(project_id).await {
            Ok(id) => id,
            Err(TesseraError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        self.is_workspace_member(user_id, workspace_id).await
    }

    pub async fn require_project_access(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> TesseraResult<()> {
        if self.can_access_project(user_id, project_id).await? {
            Ok(())
        } else {
            Err(TesseraError::Forbidden {
                reason: "no access to this project".into(),
            })
        }
    }

    // -------------------------------------------------------------------
    // Task scope
    // -------------------------------------------------------------------

    /// Three-tier union, any one grants modify rights: the user
    /// created the task, holds project LEAD/CONTRIBUTOR, or holds
    /// workspace OWNER/MEMBER.
    pub async fn can_modify_task(&self, user_id: Uuid, task_id: Uuid) -> TesseraResult<bool> {
        let access = match self.tasks.access_context(task_id, user_id).await {
            Ok(access) => access,
            Err(TesseraError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        if access.created_by == Some(user_id) {
            return Ok(true);
        }
        if matches!(
            access.project_role,
            Some(ProjectRole::Lead | ProjectRole::Contributor)
        ) {
            return Ok(true);
        }
        if matches!(
            access.workspace_role,
            Some(WorkspaceRole::Owner | WorkspaceRole::Member)
        ) {
            return Ok(true);
        }

        Ok(false)
    }

    pub async fn require_task_modify(&self, user_id: Uuid, task_id: Uuid) -> TesseraResult<()> {
        if self.can_modify_task(user_id, task_id).await? {
            Ok(())
        } else {
            Err(TesseraError::Forbidden {
                reason: "cannot modify this task".into(),
            })
        }
    }

    // -------------------------------------------------------------------
    // Scope resolution
    // -------------------------------------------------------------------

    /// Owning workspace of a project; `NotFound` when the id does not
    /// resolve.
    pub async fn workspace_id_of_project(&self, project_id: Uuid) -> TesseraResult<Uuid> {
        self.projects.workspace_id_of(project_id).await
    }

    /// Owning workspace of a task, joined through its project.
    pub async fn workspace_id_of_task(&self, task_id: Uuid) -> TesseraResult<Uuid> {
        self.tasks.workspace_id_of(task_id).await
    }

    // -------------------------------------------------------------------
    // Owner-floor invariant
    // -------------------------------------------------------------------

    /// True only when the workspace has exactly one OWNER and it is
    /// this user.
    pub async fn is_only_workspace_owner(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> TesseraResult<bool> {
        let owners = self.workspaces.owners(workspace_id).await?;
        Ok(owners.len() == 1 && owners[0] == user_id)
    }

    /// Advisory precheck for a role change. Promotion to OWNER is
    /// always fine; demoting or removing the sole remaining owner
    /// fails with `LastOwner`. The repository re-checks the same
    /// condition inside the mutating transaction, so two racing
    /// demotions cannot both pass.
    pub async fn validate_workspace_owner_change(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        new_role: WorkspaceRole,
    ) -> TesseraResult<()> {
        if new_role == WorkspaceRole::Owner {
            return Ok(());
        }

        if self.is_only_workspace_owner(user_id, workspace_id).await? {
            return Err(TesseraError::LastOwner);
        }

        Ok(())
    }
}
