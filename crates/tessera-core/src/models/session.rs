//! Device and refresh-token domain models.
//!
//! A device row is created per successful login and per rotation; its
//! `jti` correlates it with exactly one refresh-token row. Revocation is
//! a nullable timestamp on both rows, so a revoked session also records
//! when it was revoked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Unique token identifier shared with the refresh-token row.
    pub jti: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub jti: String,
    pub user_id: Uuid,
    pub device_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Input for creating a device + refresh-token pair in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub user_id: Uuid,
    pub jti: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Refresh-token row joined with its device's revocation state, as
/// returned by a jti lookup.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token: RefreshTokenRecord,
    pub device_revoked: bool,
}

impl SessionRecord {
    /// True when either side of the pair has been revoked.
    pub fn is_revoked(&self) -> bool {
        self.token.is_revoked() || self.device_revoked
    }
}
