//! Integration tests for the authorization service: role scopes,
//! visibility inheritance and the last-owner invariant.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tessera_auth::authz::AuthzService;
use tessera_core::error::TesseraError;
use tessera_core::models::project::{CreateProject, ProjectRole};
use tessera_core::models::task::CreateTask;
use tessera_core::models::user::{CreateUser, GlobalRole};
use tessera_core::models::workspace::WorkspaceRole;
use tessera_core::repository::{
    ProjectRepository, TaskRepository, UserRepository, WorkspaceRepository,
};
use tessera_db::repository::{
    SurrealProjectRepository, SurrealTaskRepository, SurrealUserRepository,
    SurrealWorkspaceRepository,
};
use uuid::Uuid;

type Authz = AuthzService<
    SurrealUserRepository<Db>,
    SurrealWorkspaceRepository<Db>,
    SurrealProjectRepository<Db>,
    SurrealTaskRepository<Db>,
>;

struct Harness {
    authz: Authz,
    users: SurrealUserRepository<Db>,
    workspaces: SurrealWorkspaceRepository<Db>,
    projects: SurrealProjectRepository<Db>,
    tasks: SurrealTaskRepository<Db>,
}

async fn setup() -> Harness {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tessera_db::run_migrations(&db).await.unwrap();

    Harness {
        authz: AuthzService::new(
            SurrealUserRepository::new(db.clone()),
            SurrealWorkspaceRepository::new(db.clone()),
            SurrealProjectRepository::new(db.clone()),
            SurrealTaskRepository::new(db.clone()),
        ),
        users: SurrealUserRepository::new(db.clone()),
        workspaces: SurrealWorkspaceRepository::new(db.clone()),
        projects: SurrealProjectRepository::new(db.clone()),
        tasks: SurrealTaskRepository::new(db),
    }
}

async fn new_user(h: &Harness, email: &str) -> Uuid {
    h.users
        .create(CreateUser {
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
            full_name: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn global_role_checks() {
    let h = setup().await;
    let user_id = new_user(&h, "u1@example.com").await;

    assert!(
        h.authz
            .has_global_role(user_id, GlobalRole::User)
            .await
            .unwrap()
    );
    assert!(
        !h.authz
            .has_global_role(user_id, GlobalRole::Admin)
            .await
            .unwrap()
    );
    // Unknown users simply have no role.
    assert!(
        !h.authz
            .has_global_role(Uuid::new_v4(), GlobalRole::Admin)
            .await
            .unwrap()
    );

    let err = h.authz.require_admin(user_id).await.unwrap_err();
    assert!(matches!(err, TesseraError::Forbidden { .. }));

    h.users
        .set_global_role(user_id, GlobalRole::Admin)
        .await
        .unwrap();
    h.authz.require_admin(user_id).await.unwrap();
}

#[tokio::test]
async fn workspace_creator_becomes_owner() {
    let h = setup().await;
    let u1 = new_user(&h, "u1@example.com").await;
    let ws = h.workspaces.create("Acme".into(), u1).await.unwrap();

    let membership = h
        .authz
        .get_workspace_membership(u1, ws.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(membership.role, WorkspaceRole::Owner);

    h.authz
        .require_workspace_role(u1, ws.id, &[WorkspaceRole::Owner])
        .await
        .unwrap();
}

#[tokio::test]
async fn workspace_role_gate() {
    let h = setup().await;
    let u1 = new_user(&h, "u1@example.com").await;
    let u2 = new_user(&h, "u2@example.com").await;
    let stranger = new_user(&h, "u3@example.com").await;
    let ws = h.workspaces.create("Acme".into(), u1).await.unwrap();

    h.workspaces
        .add_member(ws.id, u2, WorkspaceRole::Viewer)
        .await
        .unwrap();

    // Not a member at all.
    let err = h
        .authz
        .require_workspace_role(stranger, ws.id, &[WorkspaceRole::Viewer])
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::Forbidden { .. }));

    // Member, but the role is not in the allowed set.
    let err = h
        .authz
        .require_workspace_role(u2, ws.id, &[WorkspaceRole::Owner, WorkspaceRole::Member])
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::Forbidden { .. }));

    h.authz
        .require_workspace_role(u2, ws.id, &[WorkspaceRole::Viewer])
        .await
        .unwrap();
}

#[tokio::test]
async fn workspace_membership_grants_project_visibility() {
    let h = setup().await;
    let u1 = new_user(&h, "u1@example.com").await;
    let u2 = new_user(&h, "u2@example.com").await;
    let stranger = new_user(&h, "u3@example.com").await;

    let ws = h.workspaces.create("Acme".into(), u1).await.unwrap();
    h.workspaces
        .add_member(ws.id, u2, WorkspaceRole::Viewer)
        .await
        .unwrap();

    let project = h
        .projects
        .create(CreateProject {
            workspace_id: ws.id,
            name: "Apollo".into(),
            description: None,
            created_by: u1,
        })
        .await
        .unwrap();

    // Creator is a direct member (LEAD).
    assert!(h.authz.is_project_member(u1, project.id).await.unwrap());
    assert!(h.authz.can_access_project(u1, project.id).await.unwrap());

    // u2 is not a project member, but workspace membership inherits
    // read access.
    assert!(!h.authz.is_project_member(u2, project.id).await.unwrap());
    assert!(h.authz.can_access_project(u2, project.id).await.unwrap());

    assert!(
        !h.authz
            .can_access_project(stranger, project.id)
            .await
            .unwrap()
    );
    let err = h
        .authz
        .require_project_access(stranger, project.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::Forbidden { .. }));

    // A project id that does not resolve is simply "no access".
    assert!(
        !h.authz
            .can_access_project(u1, Uuid::new_v4())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn task_modify_is_a_three_tier_union() {
    let h = setup().await;
    let owner = new_user(&h, "owner@example.com").await;
    let creator = new_user(&h, "creator@example.com").await;
    let contributor = new_user(&h, "contributor@example.com").await;
    let project_viewer = new_user(&h, "viewer@example.com").await;
    let ws_member = new_user(&h, "member@example.com").await;
    let ws_viewer = new_user(&h, "wviewer@example.com").await;
    let stranger = new_user(&h, "stranger@example.com").await;

    let ws = h.workspaces.create("Acme".into(), owner).await.unwrap();
    h.workspaces
        .add_member(ws.id, ws_member, WorkspaceRole::Member)
        .await
        .unwrap();
    h.workspaces
        .add_member(ws.id, ws_viewer, WorkspaceRole::Viewer)
        .await
        .unwrap();

    let project = h
        .projects
        .create(CreateProject {
            workspace_id: ws.id,
            name: "Apollo".into(),
            description: None,
            created_by: owner,
        })
        .await
        .unwrap();
    h.projects
        .add_member(project.id, contributor, ProjectRole::Contributor)
        .await
        .unwrap();
    h.projects
        .add_member(project.id, project_viewer, ProjectRole::Viewer)
        .await
        .unwrap();

    // Creator holds no membership anywhere — the creator tier alone
    // must grant modify rights.
    let task = h
        .tasks
        .create(CreateTask {
            project_id: project.id,
            title: "Ship it".into(),
            description: None,
            created_by: creator,
        })
        .await
        .unwrap();

    assert!(h.authz.can_modify_task(creator, task.id).await.unwrap());
    assert!(h.authz.can_modify_task(contributor, task.id).await.unwrap());
    assert!(h.authz.can_modify_task(ws_member, task.id).await.unwrap());
    assert!(h.authz.can_modify_task(owner, task.id).await.unwrap());

    // VIEWER at either scope is not enough.
    assert!(
        !h.authz
            .can_modify_task(project_viewer, task.id)
            .await
            .unwrap()
    );
    assert!(!h.authz.can_modify_task(ws_viewer, task.id).await.unwrap());
    assert!(!h.authz.can_modify_task(stranger, task.id).await.unwrap());

    // Unknown task: no modify rights, and the guard reports Forbidden.
    assert!(
        !h.authz
            .can_modify_task(creator, Uuid::new_v4())
            .await
            .unwrap()
    );
    let err = h
        .authz
        .require_task_modify(stranger, task.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::Forbidden { .. }));
}

#[tokio::test]
async fn workspace_resolution_from_project_and_task() {
    let h = setup().await;
    let u1 = new_user(&h, "u1@example.com").await;
    let ws = h.workspaces.create("Acme".into(), u1).await.unwrap();
    let project = h
        .projects
        .create(CreateProject {
            workspace_id: ws.id,
            name: "Apollo".into(),
            description: None,
            created_by: u1,
        })
        .await
        .unwrap();
    let task = h
        .tasks
        .create(CreateTask {
            project_id: project.id,
            title: "Ship it".into(),
            description: None,
            created_by: u1,
        })
        .await
        .unwrap();

    assert_eq!(
        h.authz.workspace_id_of_project(project.id).await.unwrap(),
        ws.id
    );
    assert_eq!(h.authz.workspace_id_of_task(task.id).await.unwrap(), ws.id);

    let err = h
        .authz
        .workspace_id_of_project(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::NotFound { .. }));
    let err = h
        .authz
        .workspace_id_of_task(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::NotFound { .. }));
}

#[tokio::test]
async fn last_owner_cannot_be_demoted_until_another_is_promoted() {
    let h = setup().await;
    let u1 = new_user(&h, "u1@example.com").await;
    let u2 = new_user(&h, "u2@example.com").await;

    let ws = h.workspaces.create("Acme".into(), u1).await.unwrap();
    h.workspaces
        .add_member(ws.id, u2, WorkspaceRole::Member)
        .await
        .unwrap();

    assert!(h.authz.is_only_workspace_owner(u1, ws.id).await.unwrap());
    assert!(!h.authz.is_only_workspace_owner(u2, ws.id).await.unwrap());

    // Advisory precheck refuses the demotion.
    let err = h
        .authz
        .validate_workspace_owner_change(ws.id, u1, WorkspaceRole::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::LastOwner));

    // The repository enforces the same floor transactionally.
    let err = h
        .workspaces
        .update_member_role(ws.id, u1, WorkspaceRole::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::LastOwner));

    // Promotion is always allowed.
    h.authz
        .validate_workspace_owner_change(ws.id, u2, WorkspaceRole::Owner)
        .await
        .unwrap();
    h.workspaces
        .update_member_role(ws.id, u2, WorkspaceRole::Owner)
        .await
        .unwrap();

    // With a second owner in place, the original demotion succeeds.
    assert!(!h.authz.is_only_workspace_owner(u1, ws.id).await.unwrap());
    h.authz
        .validate_workspace_owner_change(ws.id, u1, WorkspaceRole::Member)
        .await
        .unwrap();
    h.workspaces
        .update_member_role(ws.id, u1, WorkspaceRole::Member)
        .await
        .unwrap();

    let membership = h
        .authz
        .get_workspace_membership(u1, ws.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(membership.role, WorkspaceRole::Member);
}

#[tokio::test]
async fn last_owner_cannot_be_removed() {
    let h = setup().await;
    let u1 = new_user(&h, "u1@example.com").await;
    let u2 = new_user(&h, "u2@example.com").await;

    let ws = h.workspaces.create("Acme".into(), u1).await.unwrap();
    h.workspaces
        .add_member(ws.id, u2, WorkspaceRole::Member)
        .await
        .unwrap();

    let err = h.workspaces.remove_member(ws.id, u1).await.unwrap_err();
    assert!(matches!(err, TesseraError::LastOwner));

    // Removing a non-owner is fine.
    h.workspaces.remove_member(ws.id, u2).await.unwrap();
    assert!(
        h.authz
            .get_workspace_membership(u2, ws.id)
            .await
            .unwrap()
            .is_none()
    );
}
