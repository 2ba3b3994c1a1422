//! SurrealDB implementation of [`PasswordResetRepository`].

use chrono::Utc;
use surrealdb::{Connection, Surreal};
use tessera_core::error::TesseraResult;
use tessera_core::models::reset::{CreatePasswordReset, PasswordResetCode};
use tessera_core::repository::PasswordResetRepository;
use uuid::Uuid;

use crate::error::{DbError, check_sentinels};

/// SurrealDB implementation of the password-reset store.
#[derive(Clone)]
pub struct SurrealPasswordResetRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPasswordResetRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PasswordResetRepository for SurrealPasswordResetRepository<C> {
    async fn create(&self, input: CreatePasswordReset) -> TesseraResult<PasswordResetCode> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.db
            .query(
                "CREATE type::record('password_reset', $id) SET \
                 user_id = $user_id, \
                 code_hash = $code_hash, \
                 expires_at = $expires_at, \
                 used = false, \
                 created_at = $now",
            )
            .bind(("id", id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("code_hash", input.code_hash.clone()))
            .bind(("expires_at", input.expires_at))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(PasswordResetCode {
            id,
            user_id: input.user_id,
            code_hash: input.code_hash,
            expires_at: input.expires_at,
            used: false,
            created_at: now,
        })
    }

    async fn redeem(
        &self,
        user_id: Uuid,
        code_hash: &str,
        new_password_hash: String,
    ) -> TesseraResult<()> {
        let user_id_str = user_id.to_string();

        // The guarded UPDATE matches only a live code; an empty match
        // aborts the transaction before the password changes, so a
        // code is redeemable at most once. Successful redemption also
        // forces re-login everywhere.
        let mut resp = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $code = (UPDATE password_reset SET used = true \
                     WHERE user_id = $user_id \
                       AND code_hash = $code_hash \
                       AND used = false \
                       AND expires_at > time::now()); \
                 IF array::len($code) == 0 { THROW 'CODE_INVALID'; }; \
                 UPDATE type::record('user', $user_id) SET \
                     password_hash = $password_hash, updated_at = time::now(); \
                 UPDATE device SET revoked_at = time::now() \
                     WHERE user_id = $user_id AND revoked_at = NONE; \
                 UPDATE refresh_token SET revoked_at = time::now() \
                     WHERE user_id = $user_id AND revoked_at = NONE; \
                 COMMIT TRANSACTION;",
            )
            .bind(("user_id", user_id_str.clone()))
            .bind(("code_hash", code_hash.to_string()))
            .bind(("password_hash", new_password_hash))
            .await
            .map_err(DbError::from)?;
        check_sentinels(&mut resp, "password_reset", &user_id_str)?;

        Ok(())
    }
}
