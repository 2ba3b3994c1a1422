//! SurrealDB implementation of [`UserRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::user::{CreateUser, GlobalRole, GlobalStatus, User};
use tessera_core::repository::{Pagination, UserRepository};
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct UserRow {
    email: String,
    password_hash: String,
    full_name: Option<String>,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    email: String,
    password_hash: String,
    full_name: Option<String>,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct IdRow {
    #[allow(dead_code)]
    record_id: String,
}

fn parse_role(s: &str) -> Result<GlobalRole, DbError> {
    GlobalRole::parse(s).ok_or_else(|| DbError::Decode(format!("unknown global role: {s}")))
}

fn parse_status(s: &str) -> Result<GlobalStatus, DbError> {
    GlobalStatus::parse(s).ok_or_else(|| DbError::Decode(format!("unknown global status: {s}")))
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        Ok(User {
            id,
            email: self.email,
            password_hash: self.password_hash,
            full_name: self.full_name,
            role: parse_role(&self.role)?,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        Ok(User {
            id,
            email: self.email,
            password_hash: self.password_hash,
            full_name: self.full_name,
            role: parse_role(&self.role)?,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the user repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn require_exists(&self, id: Uuid) -> TesseraResult<()> {
        self.get_by_id(id).await.map(|_| ())
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> TesseraResult<User> {
        // Uniqueness pre-check so a duplicate surfaces as a domain
        // conflict; the unique email index backs this under races.
        let mut existing = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM user WHERE email = $email")
            .bind(("email", input.email.clone()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<IdRow> = existing.take(0).map_err(DbError::from)?;
        if !rows.is_empty() {
            return Err(TesseraError::AlreadyExists {
                entity: "user".into(),
            });
        }

        let id = Uuid::new_v4();
        let now = Utc::now();

        self.db
            .query(
                "CREATE type::record('user', $id) SET \
                 email = $email, \
                 password_hash = $password_hash, \
                 full_name = $full_name, \
                 role = 'USER', \
                 status = 'ACTIVE', \
                 created_at = $now, \
                 updated_at = $now",
            )
            .bind(("id", id.to_string()))
            .bind(("email", input.email.clone()))
            .bind(("password_hash", input.password_hash.clone()))
            .bind(("full_name", input.full_name.clone()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(User {
            id,
            email: input.email,
            password_hash: input.password_hash,
            full_name: input.full_name,
            role: GlobalRole::User,
            status: GlobalStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> TesseraResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        row.into_user(id).map_err(Into::into)
    }

    async fn get_by_email(&self, email: &str) -> TesseraResult<User> {
        let email_owned = email.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM user WHERE email = $email")
            .bind(("email", email_owned.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("email={email_owned}"),
        })?;

        row.try_into_user().map_err(Into::into)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: String) -> TesseraResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('user', $id) SET \
                 password_hash = $password_hash, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("password_hash", password_hash))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "user".into(),
                id: id_str,
            }
            .into());
        }

        Ok(())
    }

    async fn set_global_role(&self, id: Uuid, role: GlobalRole) -> TesseraResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('user', $id) SET \
                 role = $role, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("role", role.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "user".into(),
                id: id_str,
            }
            .into());
        }

        Ok(())
    }

    async fn set_global_status(&self, id: Uuid, status: GlobalStatus) -> TesseraResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('user', $id) SET \
                 status = $status, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("status", status.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "user".into(),
                id: id_str,
            }
            .into());
        }

        Ok(())
    }

    async fn ban(&self, id: Uuid) -> TesseraResult<()> {
        self.require_exists(id).await?;

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE type::record('user', $id) SET \
                     status = 'BANNED', updated_at = time::now(); \
                 UPDATE device SET revoked_at = time::now() \
                     WHERE user_id = $id AND revoked_at = NONE; \
                 UPDATE refresh_token SET revoked_at = time::now() \
                     WHERE user_id = $id AND revoked_at = NONE; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn reset_password(&self, id: Uuid, password_hash: String) -> TesseraResult<()> {
        self.require_exists(id).await?;

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE type::record('user', $id) SET \
                     password_hash = $password_hash, updated_at = time::now(); \
                 UPDATE device SET revoked_at = time::now() \
                     WHERE user_id = $id AND revoked_at = NONE; \
                 UPDATE refresh_token SET revoked_at = time::now() \
                     WHERE user_id = $id AND revoked_at = NONE; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("password_hash", password_hash))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> TesseraResult<Vec<User>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY created_at DESC LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| row.try_into_user().map_err(TesseraError::from))
            .collect()
    }
}
