//! Audit log domain model.
//!
//! Security-relevant events are recorded through the [`AuditLog`]
//! trait in `repository`; entries are append-only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    UserLog,
    SystemLog,
    ActivityTracker,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::UserLog => "USER_LOG",
            AuditCategory::SystemLog => "SYSTEM_LOG",
            AuditCategory::ActivityTracker => "ACTIVITY_TRACKER",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub details: Value,
    pub category: AuditCategory,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            user_id: None,
            ip_address: None,
            details: Value::Null,
            category: AuditCategory::UserLog,
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn category(mut self, category: AuditCategory) -> Self {
        self.category = category;
        self
    }
}
