//! Integration tests for the authentication service, running against
//! the in-memory SurrealDB engine.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tessera_auth::config::AuthConfig;
use tessera_auth::service::{AuthService, DeviceContext, LoginInput, RegisterInput};
use tessera_auth::token;
use tessera_core::error::TesseraError;
use tessera_core::models::user::GlobalRole;
use tessera_db::SurrealAuditLog;
use tessera_db::repository::{
    SurrealPasswordResetRepository, SurrealSessionRepository, SurrealUserRepository,
};
use uuid::Uuid;

type Service = AuthService<
    SurrealUserRepository<Db>,
    SurrealSessionRepository<Db>,
    SurrealPasswordResetRepository<Db>,
    SurrealAuditLog<Db>,
>;

fn test_config() -> AuthConfig {
    AuthConfig {
        access_token_secret: "test-access-secret".into(),
        refresh_token_secret: "test-refresh-secret".into(),
        issuer: "tessera-test".into(),
        ..Default::default()
    }
}

fn device() -> DeviceContext {
    DeviceContext {
        ip_address: Some("127.0.0.1".into()),
        user_agent: Some("TestAgent".into()),
    }
}

/// Spin up an in-memory DB, run migrations and build the service.
async fn setup() -> (Service, Surreal<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tessera_db::run_migrations(&db).await.unwrap();

    let svc = AuthService::new(
        SurrealUserRepository::new(db.clone()),
        SurrealSessionRepository::new(db.clone()),
        SurrealPasswordResetRepository::new(db.clone()),
        SurrealAuditLog::new(db.clone()),
        test_config(),
    );

    (svc, db)
}

async fn register_alice(svc: &Service) -> Uuid {
    svc.register(RegisterInput {
        email: "alice@example.com".into(),
        password: "Password1!".into(),
        full_name: Some("Alice".into()),
    })
    .await
    .unwrap()
    .id
}

async fn login_alice(svc: &Service) -> tessera_auth::LoginOutput {
    svc.login(LoginInput {
        email: "alice@example.com".into(),
        password: "Password1!".into(),
        device: device(),
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn register_and_login_happy_path() {
    let (svc, _db) = setup().await;
    let user_id = register_alice(&svc).await;

    let out = login_alice(&svc).await;
    assert_eq!(out.user.id, user_id);
    assert_eq!(out.user.email, "alice@example.com");
    assert!(!out.access_token.is_empty());
    assert!(!out.refresh_token.is_empty());
    assert_eq!(out.expires_in, 900);

    // The access token round-trips subject and role.
    let claims = token::verify_access_token(&out.access_token, svc.config()).unwrap();
    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.role, "USER");

    let principal = token::principal_from_claims(&claims).unwrap();
    assert_eq!(principal.id, user_id);
    assert_eq!(principal.role, GlobalRole::User);
}

#[tokio::test]
async fn register_duplicate_email_conflicts() {
    let (svc, _db) = setup().await;
    register_alice(&svc).await;

    // Case-insensitive uniqueness: same address, different case.
    let err = svc
        .register(RegisterInput {
            email: "Alice@Example.COM".into(),
            password: "Password1!".into(),
            full_name: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TesseraError::AlreadyExists { .. }));
}

#[tokio::test]
async fn register_weak_password_rejected() {
    let (svc, _db) = setup().await;

    let err = svc
        .register(RegisterInput {
            email: "bob@example.com".into(),
            password: "short".into(),
            full_name: None,
        })
        .await
        .unwrap_err();

    match err {
        TesseraError::Validation { message } => {
            // Every violated rule is reported, not just the first.
            assert!(message.contains("8 characters"));
            assert!(message.contains("uppercase"));
            assert!(message.contains("number"));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let (svc, _db) = setup().await;
    register_alice(&svc).await;

    let unknown_email = svc
        .login(LoginInput {
            email: "nobody@example.com".into(),
            password: "Password1!".into(),
            device: device(),
        })
        .await
        .unwrap_err();

    let wrong_password = svc
        .login(LoginInput {
            email: "alice@example.com".into(),
            password: "WrongPassword1!".into(),
            device: device(),
        })
        .await
        .unwrap_err();

    assert!(matches!(unknown_email, TesseraError::InvalidCredentials));
    assert!(matches!(wrong_password, TesseraError::InvalidCredentials));
    // Same kind AND same rendered message.
    assert_eq!(unknown_email.to_string(), wrong_password.to_string());
}

#[tokio::test]
async fn banned_account_cannot_login() {
    let (svc, _db) = setup().await;
    let user_id = register_alice(&svc).await;

    let admin_id = Uuid::new_v4();
    svc.ban_user(admin_id, user_id, None).await.unwrap();

    let err = svc
        .login(LoginInput {
            email: "alice@example.com".into(),
            password: "Password1!".into(),
            device: device(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::AccountBanned));

    svc.unban_user(admin_id, user_id, None).await.unwrap();
    assert!(!login_alice(&svc).await.access_token.is_empty());
}

#[tokio::test]
async fn refresh_rotates_and_replay_fails() {
    let (svc, _db) = setup().await;
    let user_id = register_alice(&svc).await;
    let login_out = login_alice(&svc).await;

    let refreshed = svc
        .refresh(&login_out.refresh_token, device())
        .await
        .unwrap();
    assert!(!refreshed.access_token.is_empty());
    assert_ne!(refreshed.refresh_token, login_out.refresh_token);

    let claims = token::verify_access_token(&refreshed.access_token, svc.config()).unwrap();
    assert_eq!(claims.sub, user_id.to_string());

    // Single-use: the original refresh token is now dead.
    let err = svc
        .refresh(&login_out.refresh_token, device())
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidToken { .. }));

    // The rotated token still works.
    svc.refresh(&refreshed.refresh_token, device())
        .await
        .unwrap();
}

#[tokio::test]
async fn refresh_with_garbage_token_fails() {
    let (svc, _db) = setup().await;

    let err = svc
        .refresh("totally-bogus-token", device())
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidToken { .. }));
}

#[tokio::test]
async fn refresh_rejects_access_token() {
    let (svc, _db) = setup().await;
    register_alice(&svc).await;
    let login_out = login_alice(&svc).await;

    // Wrong category: signed with the access secret and tagged
    // `access`, so the refresh verifier must reject it.
    let err = svc.refresh(&login_out.access_token, device()).await.unwrap_err();
    assert!(matches!(err, TesseraError::InvalidToken { .. }));
}

#[tokio::test]
async fn logout_is_best_effort_and_idempotent() {
    let (svc, _db) = setup().await;
    register_alice(&svc).await;
    let login_out = login_alice(&svc).await;

    svc.logout(&login_out.refresh_token, Some("127.0.0.1".into()))
        .await;
    // Second logout with the same token and a garbage logout both
    // complete without error.
    svc.logout(&login_out.refresh_token, None).await;
    svc.logout("garbage", None).await;

    let err = svc
        .refresh(&login_out.refresh_token, device())
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidToken { .. }));
}

#[tokio::test]
async fn password_reset_revokes_all_sessions() {
    let (svc, _db) = setup().await;
    register_alice(&svc).await;
    let session_a = login_alice(&svc).await;
    let session_b = login_alice(&svc).await;

    let code = svc
        .generate_password_reset_code("alice@example.com")
        .await
        .unwrap();

    svc.reset_password_with_code("alice@example.com", &code, "NewPassword2!")
        .await
        .unwrap();

    // Old access tokens still verify — they are stateless.
    assert!(token::verify_access_token(&session_a.access_token, svc.config()).is_ok());

    // But every pre-reset refresh token is dead.
    for refresh_token in [&session_a.refresh_token, &session_b.refresh_token] {
        let err = svc.refresh(refresh_token, device()).await.unwrap_err();
        assert!(matches!(err, TesseraError::InvalidToken { .. }));
    }

    // Old password no longer works; the new one does.
    let err = svc
        .login(LoginInput {
            email: "alice@example.com".into(),
            password: "Password1!".into(),
            device: device(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidCredentials));

    svc.login(LoginInput {
        email: "alice@example.com".into(),
        password: "NewPassword2!".into(),
        device: device(),
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn reset_code_is_single_use() {
    let (svc, _db) = setup().await;
    register_alice(&svc).await;

    let code = svc
        .generate_password_reset_code("alice@example.com")
        .await
        .unwrap();

    svc.reset_password_with_code("alice@example.com", &code, "NewPassword2!")
        .await
        .unwrap();

    let err = svc
        .reset_password_with_code("alice@example.com", &code, "NewPassword3!")
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidToken { .. }));
}

#[tokio::test]
async fn reset_code_for_unknown_email_is_inert() {
    let (svc, _db) = setup().await;
    register_alice(&svc).await;

    // The caller still gets a code (account existence is not
    // disclosed), but nothing redeemable was stored.
    let code = svc
        .generate_password_reset_code("nobody@example.com")
        .await
        .unwrap();
    assert!(!code.is_empty());

    let err = svc
        .reset_password_with_code("nobody@example.com", &code, "NewPassword2!")
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidToken { .. }));
}

#[tokio::test]
async fn wrong_reset_code_fails() {
    let (svc, _db) = setup().await;
    register_alice(&svc).await;

    let _real = svc
        .generate_password_reset_code("alice@example.com")
        .await
        .unwrap();

    let err = svc
        .reset_password_with_code("alice@example.com", "not-the-code", "NewPassword2!")
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidToken { .. }));
}

#[tokio::test]
async fn update_password_checks_current() {
    let (svc, _db) = setup().await;
    let user_id = register_alice(&svc).await;

    let err = svc
        .update_password(user_id, "WrongPassword1!", "NewPassword2!")
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidCredentials));

    svc.update_password(user_id, "Password1!", "NewPassword2!")
        .await
        .unwrap();

    svc.login(LoginInput {
        email: "alice@example.com".into(),
        password: "NewPassword2!".into(),
        device: device(),
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn revoke_device_requires_ownership() {
    let (svc, _db) = setup().await;
    let user_id = register_alice(&svc).await;
    let login_out = login_alice(&svc).await;

    let devices = svc.list_devices(user_id).await.unwrap();
    assert_eq!(devices.len(), 1);
    let device_id = devices[0].id;

    // Someone else's device id does not resolve for this user.
    let err = svc
        .revoke_device(Uuid::new_v4(), device_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::NotFound { .. }));

    svc.revoke_device(user_id, device_id, Some("127.0.0.1".into()))
        .await
        .unwrap();

    let err = svc
        .refresh(&login_out.refresh_token, device())
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidToken { .. }));
}

#[tokio::test]
async fn devices_are_listed_newest_first() {
    let (svc, _db) = setup().await;
    let user_id = register_alice(&svc).await;
    login_alice(&svc).await;
    login_alice(&svc).await;
    login_alice(&svc).await;

    let devices = svc.list_devices(user_id).await.unwrap();
    assert_eq!(devices.len(), 3);
    for window in devices.windows(2) {
        assert!(window[0].created_at >= window[1].created_at);
    }
}

#[tokio::test]
async fn ban_kills_live_refresh_tokens() {
    let (svc, _db) = setup().await;
    let user_id = register_alice(&svc).await;
    let login_out = login_alice(&svc).await;

    svc.ban_user(Uuid::new_v4(), user_id, None).await.unwrap();

    let err = svc
        .refresh(&login_out.refresh_token, device())
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidToken { .. }));
}

#[tokio::test]
async fn admin_reset_password_forces_relogin() {
    let (svc, _db) = setup().await;
    let user_id = register_alice(&svc).await;
    let login_out = login_alice(&svc).await;

    svc.admin_reset_password(Uuid::new_v4(), user_id, "AdminSet3!", None)
        .await
        .unwrap();

    let err = svc
        .refresh(&login_out.refresh_token, device())
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidToken { .. }));

    svc.login(LoginInput {
        email: "alice@example.com".into(),
        password: "AdminSet3!".into(),
        device: device(),
    })
    .await
    .unwrap();
}
