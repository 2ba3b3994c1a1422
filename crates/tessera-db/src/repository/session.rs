//! SurrealDB implementation of [`SessionRepository`].
//!
//! A session is a device row plus a refresh-token row sharing one
//! jti. Every lifecycle mutation that touches both rows runs as a
//! single transaction; rotation additionally re-checks in-query that
//! the old token is still live, so double redemption aborts.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::session::{CreateSession, Device, RefreshTokenRecord, SessionRecord};
use tessera_core::repository::SessionRepository;
use uuid::Uuid;

use crate::error::{DbError, check_sentinels};

#[derive(Debug, SurrealValue)]
struct DeviceRowWithId {
    record_id: String,
    user_id: String,
    jti: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    revoked_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl DeviceRowWithId {
    fn try_into_device(self) -> Result<Device, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid device UUID: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| DbError::Decode(format!("invalid user UUID: {e}")))?;
        Ok(Device {
            id,
            user_id,
            jti: self.jti,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            revoked_at: self.revoked_at,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct TokenRowWithId {
    record_id: String,
    jti: String,
    user_id: String,
    device_id: String,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TokenRowWithId {
    fn try_into_token(self) -> Result<RefreshTokenRecord, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid token UUID: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| DbError::Decode(format!("invalid user UUID: {e}")))?;
        let device_id = Uuid::parse_str(&self.device_id)
            .map_err(|e| DbError::Decode(format!("invalid device UUID: {e}")))?;
        Ok(RefreshTokenRecord {
            id,
            jti: self.jti,
            user_id,
            device_id,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct RevokedRow {
    revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, SurrealValue)]
struct JtiRow {
    jti: String,
}

/// SurrealDB implementation of the session store.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: CreateSession) -> TesseraResult<Device> {
        let device_id = Uuid::new_v4();
        let token_id = Uuid::new_v4();
        let now = Utc::now();

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('device', $device_id) SET \
                     user_id = $user_id, \
                     jti = $jti, \
                     ip_address = $ip_address, \
                     user_agent = $user_agent, \
                     revoked_at = NONE, \
                     last_used_at = NONE, \
                     created_at = $now; \
                 CREATE type::record('refresh_token', $token_id) SET \
                     jti = $jti, \
                     user_id = $user_id, \
                     device_id = $device_id, \
                     expires_at = $expires_at, \
                     revoked_at = NONE, \
                     created_at = $now; \
                 COMMIT TRANSACTION;",
            )
            .bind(("device_id", device_id.to_string()))
            .bind(("token_id", token_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("jti", input.jti.clone()))
            .bind(("ip_address", input.ip_address.clone()))
            .bind(("user_agent", input.user_agent.clone()))
            .bind(("expires_at", input.expires_at))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(Device {
            id: device_id,
            user_id: input.user_id,
            jti: input.jti,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            revoked_at: None,
            last_used_at: None,
            created_at: now,
        })
    }

    async fn get_by_jti(&self, jti: &str) -> TesseraResult<SessionRecord> {
        let jti_owned = jti.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE jti = $jti; \
                 SELECT revoked_at FROM device WHERE jti = $jti;",
            )
            .bind(("jti", jti_owned.clone()))
            .await
            .map_err(DbError::from)?;

        let token_rows: Vec<TokenRowWithId> = result.take(0).map_err(DbError::from)?;
        let token_row = token_rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "refresh_token".into(),
                id: format!("jti={jti_owned}"),
            })?;

        let device_rows: Vec<RevokedRow> = result.take(1).map_err(DbError::from)?;
        let device_revoked = device_rows
            .first()
            .map(|r| r.revoked_at.is_some())
            .unwrap_or(false);

        Ok(SessionRecord {
            token: token_row.try_into_token()?,
            device_revoked,
        })
    }

    async fn rotate(&self, old_jti: &str, input: CreateSession) -> TesseraResult<Device> {
        let device_id = Uuid::new_v4();
        let token_id = Uuid::new_v4();
        let now = Utc::now();
        let old_jti_owned = old_jti.to_string();

        // The LET + THROW pair is the single-use guard: the UPDATE
        // matches only a live token row, and an empty match aborts the
        // whole transaction before anything new is created.
        let mut resp = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $consumed = (UPDATE refresh_token \
                     SET revoked_at = time::now() \
                     WHERE jti = $old_jti AND revoked_at = NONE); \
                 IF array::len($consumed) == 0 { THROW 'TOKEN_CONSUMED'; }; \
                 UPDATE device SET revoked_at = time::now() \
                     WHERE jti = $old_jti AND revoked_at = NONE; \
                 CREATE type::record('device', $device_id) SET \
                     user_id = $user_id, \
                     jti = $jti, \
                     ip_address = $ip_address, \
                     user_agent = $user_agent, \
                     revoked_at = NONE, \
                     last_used_at = $now, \
                     created_at = $now; \
                 CREATE type::record('refresh_token', $token_id) SET \
                     jti = $jti, \
                     user_id = $user_id, \
                     device_id = $device_id, \
                     expires_at = $expires_at, \
                     revoked_at = NONE, \
                     created_at = $now; \
                 COMMIT TRANSACTION;",
            )
            .bind(("old_jti", old_jti_owned.clone()))
            .bind(("device_id", device_id.to_string()))
            .bind(("token_id", token_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("jti", input.jti.clone()))
            .bind(("ip_address", input.ip_address.clone()))
            .bind(("user_agent", input.user_agent.clone()))
            .bind(("expires_at", input.expires_at))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;
        check_sentinels(&mut resp, "refresh_token", &old_jti_owned)?;

        Ok(Device {
            id: device_id,
            user_id: input.user_id,
            jti: input.jti,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            revoked_at: None,
            last_used_at: Some(now),
            created_at: now,
        })
    }

    async fn revoke_by_jti(&self, jti: &str) -> TesseraResult<()> {
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE refresh_token SET revoked_at = time::now() \
                     WHERE jti = $jti AND revoked_at = NONE; \
                 UPDATE device SET revoked_at = time::now() \
                     WHERE jti = $jti AND revoked_at = NONE; \
                 COMMIT TRANSACTION;",
            )
            .bind(("jti", jti.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> TesseraResult<()> {
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE refresh_token SET revoked_at = time::now() \
                     WHERE user_id = $user_id AND revoked_at = NONE; \
                 UPDATE device SET revoked_at = time::now() \
                     WHERE user_id = $user_id AND revoked_at = NONE; \
                 COMMIT TRANSACTION;",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn revoke_device(&self, user_id: Uuid, device_id: Uuid) -> TesseraResult<()> {
        let id_str = device_id.to_string();

        // Ownership check before anything is revoked.
        let mut result = self
            .db
            .query("SELECT jti FROM type::record('device', $id) WHERE user_id = $user_id")
            .bind(("id", id_str.clone()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JtiRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "device".into(),
            id: id_str.clone(),
        })?;

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE type::record('device', $id) SET revoked_at = time::now() \
                     WHERE revoked_at = NONE; \
                 UPDATE refresh_token SET revoked_at = time::now() \
                     WHERE jti = $jti AND revoked_at = NONE; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str))
            .bind(("jti", row.jti))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_devices(&self, user_id: Uuid) -> TesseraResult<Vec<Device>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM device \
                 WHERE user_id = $user_id ORDER BY created_at DESC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DeviceRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| row.try_into_device().map_err(TesseraError::from))
            .collect()
    }
}
