//! Authentication service — registration, login, token rotation and
//! credential lifecycle orchestration.

use chrono::{Duration, Utc};
use serde_json::json;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::audit::AuditEntry;
use tessera_core::models::reset::CreatePasswordReset;
use tessera_core::models::session::{CreateSession, Device};
use tessera_core::models::user::{CreateUser, GlobalRole, GlobalStatus, UserProfile};
use tessera_core::repository::{
    AuditLog, PasswordResetRepository, SessionRepository, UserRepository,
};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token;

/// Client context captured per request: where the call came from.
#[derive(Debug, Clone, Default)]
pub struct DeviceContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub device: DeviceContext,
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    pub user: UserProfile,
    /// Signed JWT access token.
    pub access_token: String,
    /// Signed JWT refresh token (single-use; rotated on redemption).
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Successful refresh result (new token pair).
#[derive(Debug)]
pub struct RefreshOutput {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer has
/// no dependency on the database crate. The audit sink is injected at
/// construction — there is no process-global logger in this crate.
pub struct AuthService<U, S, P, L>
where
    U: UserRepository,
    S: SessionRepository,
    P: PasswordResetRepository,
    L: AuditLog,
{
    users: U,
    sessions: S,
    resets: P,
    audit: L,
    config: AuthConfig,
}

impl<U, S, P, L> AuthService<U, S, P, L>
where
    U: UserRepository,
    S: SessionRepository,
    P: PasswordResetRepository,
    L: AuditLog,
{
    pub fn new(users: U, sessions: S, resets: P, audit: L, config: AuthConfig) -> Self {
        Self {
            users,
            sessions,
            resets,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Register a new user. Fails with `AlreadyExists` when the email
    /// is taken (case-insensitive).
    pub async fn register(&self, input: RegisterInput) -> TesseraResult<UserProfile> {
        let email = normalize_email(&input.email);
        if !email.contains('@') {
            return Err(TesseraError::Validation {
                message: "invalid email address".into(),
            });
        }

        let report = self.config.password_policy.check(&input.password);
        if !report.valid {
            return Err(AuthError::WeakPassword(report.violations).into());
        }

        let password_hash = password::hash_password(&input.password)?;
        let user = self
            .users
            .create(CreateUser {
                email,
                password_hash,
                full_name: input.full_name,
            })
            .await?;

        self.audit
            .record(AuditEntry::new("USER_REGISTERED").user(user.id))
            .await;

        Ok(user.into())
    }

    /// Authenticate with email + password and open a session.
    ///
    /// Unknown email and wrong password fail identically — callers
    /// must not learn which check failed.
    pub async fn login(&self, input: LoginInput) -> TesseraResult<LoginOutput> {
        let email = normalize_email(&input.email);

        // 1. Look up the account.
        let user = match self.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(TesseraError::NotFound { .. }) => {
                self.audit_login_failure(&email, &input.device, "unknown account")
                    .await;
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        // 2. Check global status.
        if user.status == GlobalStatus::Banned {
            self.audit_login_failure(&email, &input.device, "account banned")
                .await;
            return Err(AuthError::AccountBanned.into());
        }

        // 3. Verify the password.
        if !password::verify_password(&input.password, &user.password_hash)? {
            self.audit_login_failure(&email, &input.device, "invalid password")
                .await;
            return Err(AuthError::InvalidCredentials.into());
        }

        // 4. Issue tokens and persist the device + token pair.
        let jti = token::generate_jti();
        let access_token = token::issue_access_token(user.id, user.role, &self.config)?;
        let refresh_token = token::issue_refresh_token(user.id, &jti, &self.config)?;

        self.sessions
            .create(self.session_input(user.id, jti, &input.device))
            .await?;

        self.audit
            .record(
                AuditEntry::new("LOGIN_SUCCESS")
                    .user(user.id)
                    .ip(input.device.ip_address.clone())
                    .details(json!({ "user_agent": input.device.user_agent })),
            )
            .await;

        Ok(LoginOutput {
            user: user.into(),
            access_token,
            refresh_token,
            expires_in: self.config.access_token_ttl_secs,
        })
    }

    /// Redeem a refresh token for a new token pair.
    ///
    /// Redemption is single-use: the presented jti is revoked and a
    /// fresh device + token pair created in the same transaction, so a
    /// replayed token always fails after the first rotation.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        device: DeviceContext,
    ) -> TesseraResult<RefreshOutput> {
        // 1. Verify signature, expiry and type tag.
        let claims = token::verify_refresh_token(refresh_token, &self.config)
            .map_err(|e| TesseraError::InvalidToken {
                reason: e.to_string(),
            })?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| TesseraError::InvalidToken {
            reason: "subject is not a UUID".into(),
        })?;

        // 2. Join the jti against the session store.
        let record = match self.sessions.get_by_jti(&claims.jti).await {
            Ok(record) => record,
            Err(TesseraError::NotFound { .. }) => {
                return Err(TesseraError::InvalidToken {
                    reason: "refresh token not found".into(),
                });
            }
            Err(e) => return Err(e),
        };

        if record.token.user_id != user_id {
            return Err(TesseraError::InvalidToken {
                reason: "refresh token does not belong to the subject".into(),
            });
        }
        if record.is_revoked() {
            return Err(TesseraError::InvalidToken {
                reason: "refresh token has been revoked".into(),
            });
        }
        if record.token.expires_at <= Utc::now() {
            // Revoke the stale pair and reject.
            let _ = self.sessions.revoke_by_jti(&claims.jti).await;
            return Err(TesseraError::InvalidToken {
                reason: "refresh token has expired".into(),
            });
        }

        // 3. The subject must still exist and be in good standing.
        let user = match self.users.get_by_id(user_id).await {
            Ok(user) => user,
            Err(TesseraError::NotFound { .. }) => {
                return Err(TesseraError::InvalidToken {
                    reason: "unknown subject".into(),
                });
            }
            Err(e) => return Err(e),
        };
        if user.status == GlobalStatus::Banned {
            return Err(AuthError::AccountBanned.into());
        }

        // 4. Rotate: revoke old pair, create new pair, one transaction.
        let jti = token::generate_jti();
        let access_token = token::issue_access_token(user.id, user.role, &self.config)?;
        let new_refresh_token = token::issue_refresh_token(user.id, &jti, &self.config)?;

        self.sessions
            .rotate(&claims.jti, self.session_input(user.id, jti, &device))
            .await?;

        self.audit
            .record(
                AuditEntry::new("TOKEN_REFRESH")
                    .user(user.id)
                    .ip(device.ip_address.clone()),
            )
            .await;

        Ok(RefreshOutput {
            access_token,
            refresh_token: new_refresh_token,
            expires_in: self.config.access_token_ttl_secs,
        })
    }

    /// Revoke the session behind a refresh token.
    ///
    /// Best-effort and idempotent: an invalid, expired or already
    /// revoked token is logged and ignored — logout never fails.
    pub async fn logout(&self, refresh_token: &str, ip_address: Option<String>) {
        let claims = match token::verify_refresh_token(refresh_token, &self.config) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "logout with unverifiable refresh token");
                return;
            }
        };

        if let Err(e) = self.sessions.revoke_by_jti(&claims.jti).await {
            tracing::warn!(error = %e, "failed to revoke session on logout");
            return;
        }

        let user_id = Uuid::parse_str(&claims.sub).ok();
        let mut entry = AuditEntry::new("LOGOUT").ip(ip_address);
        if let Some(id) = user_id {
            entry = entry.user(id);
        }
        self.audit.record(entry).await;
    }

    /// Revoke one of the caller's devices. `NotFound` unless the
    /// device belongs to `user_id`.
    pub async fn revoke_device(
        &self,
        user_id: Uuid,
        device_id: Uuid,
        ip_address: Option<String>,
    ) -> TesseraResult<()> {
        self.sessions.revoke_device(user_id, device_id).await?;

        self.audit
            .record(
                AuditEntry::new("DEVICE_REVOKED")
                    .user(user_id)
                    .ip(ip_address)
                    .details(json!({ "device_id": device_id })),
            )
            .await;

        Ok(())
    }

    /// All of a user's devices, newest first.
    pub async fn list_devices(&self, user_id: Uuid) -> TesseraResult<Vec<Device>> {
        self.sessions.list_devices(user_id).await
    }

    /// Generate a password-reset code for an email address.
    ///
    /// Always returns a code so the response shape does not disclose
    /// whether the account exists; the code is only persisted (and
    /// thus redeemable) when it does. Delivery is the caller's
    /// concern.
    pub async fn generate_password_reset_code(&self, email: &str) -> TesseraResult<String> {
        let email = normalize_email(email);
        let code = token::generate_reset_code();
        let code_hash = token::hash_reset_code(&code);

        match self.users.get_by_email(&email).await {
            Ok(user) => {
                let expires_at =
                    Utc::now() + Duration::seconds(self.config.reset_code_ttl_secs as i64);
                self.resets
                    .create(CreatePasswordReset {
                        user_id: user.id,
                        code_hash,
                        expires_at,
                    })
                    .await?;
                self.audit
                    .record(AuditEntry::new("PASSWORD_RESET_REQUESTED").user(user.id))
                    .await;
            }
            Err(TesseraError::NotFound { .. }) => {
                // Inert code: same shape, nothing redeemable stored.
            }
            Err(e) => return Err(e),
        }

        Ok(code)
    }

    /// Redeem a reset code: set the new password and revoke every
    /// session for the user, in one transaction. A missing account,
    /// an unknown code, an expired code and a used code all fail with
    /// the same kind.
    pub async fn reset_password_with_code(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> TesseraResult<()> {
        let report = self.config.password_policy.check(new_password);
        if !report.valid {
            return Err(AuthError::WeakPassword(report.violations).into());
        }

        let email = normalize_email(email);
        let user = match self.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(TesseraError::NotFound { .. }) => return Err(AuthError::ResetCodeInvalid.into()),
            Err(e) => return Err(e),
        };

        let code_hash = token::hash_reset_code(code);
        let new_password_hash = password::hash_password(new_password)?;
        self.resets
            .redeem(user.id, &code_hash, new_password_hash)
            .await?;

        self.audit
            .record(AuditEntry::new("PASSWORD_RESET").user(user.id))
            .await;

        Ok(())
    }

    /// Self-service password change. Existing sessions stay valid.
    pub async fn update_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> TesseraResult<()> {
        let user = self.users.get_by_id(user_id).await?;

        if !password::verify_password(old_password, &user.password_hash)? {
            return Err(AuthError::InvalidCurrentPassword.into());
        }

        let report = self.config.password_policy.check(new_password);
        if !report.valid {
            return Err(AuthError::WeakPassword(report.violations).into());
        }

        let new_hash = password::hash_password(new_password)?;
        self.users.update_password_hash(user_id, new_hash).await?;

        self.audit
            .record(AuditEntry::new("PASSWORD_CHANGED").user(user_id))
            .await;

        Ok(())
    }

    /// Ban an account and revoke all of its sessions (one
    /// transaction). Authorization is the caller's responsibility;
    /// `admin_id` is recorded for the audit trail.
    pub async fn ban_user(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
        ip_address: Option<String>,
    ) -> TesseraResult<()> {
        self.users.ban(target_user_id).await?;
        self.audit
            .record(
                AuditEntry::new("USER_BANNED")
                    .user(admin_id)
                    .ip(ip_address)
                    .details(json!({ "target_user_id": target_user_id })),
            )
            .await;
        Ok(())
    }

    pub async fn unban_user(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
        ip_address: Option<String>,
    ) -> TesseraResult<()> {
        self.users
            .set_global_status(target_user_id, GlobalStatus::Active)
            .await?;
        self.audit
            .record(
                AuditEntry::new("USER_UNBANNED")
                    .user(admin_id)
                    .ip(ip_address)
                    .details(json!({ "target_user_id": target_user_id })),
            )
            .await;
        Ok(())
    }

    /// Admin-driven password reset: replaces the hash and revokes all
    /// sessions in one transaction.
    pub async fn admin_reset_password(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
        new_password: &str,
        ip_address: Option<String>,
    ) -> TesseraResult<()> {
        let report = self.config.password_policy.check(new_password);
        if !report.valid {
            return Err(AuthError::WeakPassword(report.violations).into());
        }

        let new_hash = password::hash_password(new_password)?;
        self.users.reset_password(target_user_id, new_hash).await?;

        self.audit
            .record(
                AuditEntry::new("ADMIN_RESET_PASSWORD")
                    .user(admin_id)
                    .ip(ip_address)
                    .details(json!({ "target_user_id": target_user_id })),
            )
            .await;
        Ok(())
    }

    pub async fn change_global_role(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
        role: GlobalRole,
        ip_address: Option<String>,
    ) -> TesseraResult<()> {
        self.users.set_global_role(target_user_id, role).await?;
        self.audit
            .record(
                AuditEntry::new("ROLE_CHANGED")
                    .user(admin_id)
                    .ip(ip_address)
                    .details(json!({
                        "target_user_id": target_user_id,
                        "role": role.as_str(),
                    })),
            )
            .await;
        Ok(())
    }

    fn session_input(&self, user_id: Uuid, jti: String, device: &DeviceContext) -> CreateSession {
        CreateSession {
            user_id,
            jti,
            ip_address: device.ip_address.clone(),
            user_agent: device.user_agent.clone(),
            expires_at: Utc::now() + Duration::seconds(self.config.refresh_token_ttl_secs as i64),
        }
    }

    async fn audit_login_failure(&self, email: &str, device: &DeviceContext, reason: &str) {
        self.audit
            .record(
                AuditEntry::new("LOGIN_FAILURE")
                    .ip(device.ip_address.clone())
                    .details(json!({ "email": email, "reason": reason })),
            )
            .await;
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
