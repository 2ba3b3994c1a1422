//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Operations that the lifecycle
//! flows require to be all-or-nothing (token rotation, reset-code
//! redemption, ban) are single trait methods so the implementation can
//! run them inside one storage transaction.

use uuid::Uuid;

use crate::error::TesseraResult;
use crate::models::{
    audit::AuditEntry,
    project::{CreateProject, Project, ProjectMembership, ProjectRole},
    reset::{CreatePasswordReset, PasswordResetCode},
    session::{CreateSession, Device, SessionRecord},
    task::{CreateTask, Task, TaskAccess},
    user::{CreateUser, GlobalRole, GlobalStatus, User},
    workspace::{Workspace, WorkspaceMembership, WorkspaceRole},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the (lowercased) email is taken.
    fn create(&self, input: CreateUser) -> impl Future<Output = TesseraResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TesseraResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = TesseraResult<User>> + Send;
    fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: String,
    ) -> impl Future<Output = TesseraResult<()>> + Send;
    fn set_global_role(
        &self,
        id: Uuid,
        role: GlobalRole,
    ) -> impl Future<Output = TesseraResult<()>> + Send;
    fn set_global_status(
        &self,
        id: Uuid,
        status: GlobalStatus,
    ) -> impl Future<Output = TesseraResult<()>> + Send;
    /// Set status to BANNED and revoke every device and refresh token
    /// belonging to the user, in one transaction.
    fn ban(&self, id: Uuid) -> impl Future<Output = TesseraResult<()>> + Send;
    /// Replace the password hash and revoke every session for the
    /// user, in one transaction (admin-driven reset).
    fn reset_password(
        &self,
        id: Uuid,
        password_hash: String,
    ) -> impl Future<Output = TesseraResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = TesseraResult<Vec<User>>> + Send;
}

// ---------------------------------------------------------------------------
// Sessions (device + refresh-token pairs)
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    /// Insert a device row and its refresh-token row in one transaction.
    fn create(&self, input: CreateSession) -> impl Future<Output = TesseraResult<Device>> + Send;

    /// Look up a refresh-token row by jti, joined with its device's
    /// revocation state. `NotFound` when the jti is unknown.
    fn get_by_jti(&self, jti: &str)
    -> impl Future<Output = TesseraResult<SessionRecord>> + Send;

    /// Single-use redemption: revoke the old jti's device + token rows
    /// and create the new pair, all in one transaction. The revocation
    /// is conditional on the old token being unrevoked — a second
    /// redemption of the same jti fails with `InvalidToken` even under
    /// concurrent calls.
    fn rotate(
        &self,
        old_jti: &str,
        input: CreateSession,
    ) -> impl Future<Output = TesseraResult<Device>> + Send;

    /// Revoke the device + token pair for a jti. Idempotent.
    fn revoke_by_jti(&self, jti: &str) -> impl Future<Output = TesseraResult<()>> + Send;

    /// Revoke every device and refresh token for a user.
    fn revoke_all_for_user(&self, user_id: Uuid)
    -> impl Future<Output = TesseraResult<()>> + Send;

    /// Revoke one device and its refresh token. `NotFound` unless the
    /// device exists and belongs to `user_id`.
    fn revoke_device(
        &self,
        user_id: Uuid,
        device_id: Uuid,
    ) -> impl Future<Output = TesseraResult<()>> + Send;

    /// All devices for a user, newest first.
    fn list_devices(&self, user_id: Uuid)
    -> impl Future<Output = TesseraResult<Vec<Device>>> + Send;
}

// ---------------------------------------------------------------------------
// Password reset codes
// ---------------------------------------------------------------------------

pub trait PasswordResetRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePasswordReset,
    ) -> impl Future<Output = TesseraResult<PasswordResetCode>> + Send;

    /// Consume a live (unused, unexpired) code matching `code_hash`:
    /// mark it used, store the new password hash, and revoke every
    /// session for the user — one transaction. Fails with
    /// `InvalidToken` when no live matching code exists.
    fn redeem(
        &self,
        user_id: Uuid,
        code_hash: &str,
        new_password_hash: String,
    ) -> impl Future<Output = TesseraResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

pub trait WorkspaceRepository: Send + Sync {
    /// Create the workspace and add the creator as OWNER in one
    /// transaction.
    fn create(
        &self,
        name: String,
        created_by: Uuid,
    ) -> impl Future<Output = TesseraResult<Workspace>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TesseraResult<Workspace>> + Send;

    fn get_membership(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Option<WorkspaceMembership>>> + Send;

    /// Upsert-free insert: an existing (workspace, user) row is left
    /// untouched.
    fn add_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> impl Future<Output = TesseraResult<()>> + Send;

    /// Change a member's role. Re-checks the owner floor inside the
    /// same transaction: demoting the sole OWNER fails with
    /// `LastOwner` even when two demotions race.
    fn update_member_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> impl Future<Output = TesseraResult<()>> + Send;

    /// Remove a member and their memberships in the workspace's
    /// projects. Subject to the same owner-floor check as a demotion.
    fn remove_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<()>> + Send;

    /// User ids holding the OWNER role in a workspace.
    fn owners(&self, workspace_id: Uuid)
    -> impl Future<Output = TesseraResult<Vec<Uuid>>> + Send;

    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Vec<Workspace>>> + Send;
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

pub trait ProjectRepository: Send + Sync {
    /// Create the project and add the creator as LEAD in one
    /// transaction.
    fn create(&self, input: CreateProject)
    -> impl Future<Output = TesseraResult<Project>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TesseraResult<Project>> + Send;

    fn get_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Option<ProjectMembership>>> + Send;

    fn add_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> impl Future<Output = TesseraResult<()>> + Send;

    /// Owning workspace id; `NotFound` when the project id does not
    /// resolve.
    fn workspace_id_of(&self, project_id: Uuid)
    -> impl Future<Output = TesseraResult<Uuid>> + Send;
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub trait TaskRepository: Send + Sync {
    fn create(&self, input: CreateTask) -> impl Future<Output = TesseraResult<Task>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TesseraResult<Task>> + Send;

    /// Owning workspace id, joined through the task's project;
    /// `NotFound` when the task id does not resolve.
    fn workspace_id_of(&self, task_id: Uuid)
    -> impl Future<Output = TesseraResult<Uuid>> + Send;

    /// The task's creator plus the user's project and workspace roles
    /// for the task's project and owning workspace. `NotFound` when
    /// the task id does not resolve.
    fn access_context(
        &self,
        task_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<TaskAccess>> + Send;
}

// ---------------------------------------------------------------------------
// Audit sink
// ---------------------------------------------------------------------------

/// Fire-and-forget sink for security-relevant events. Implementations
/// must swallow delivery failures — callers never depend on the audit
/// write succeeding.
pub trait AuditLog: Send + Sync {
    fn record(&self, entry: AuditEntry) -> impl Future<Output = ()> + Send;
}
