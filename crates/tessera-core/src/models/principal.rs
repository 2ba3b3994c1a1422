//! The authenticated identity attached to a request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::GlobalRole;

/// Verified identity + global role, passed by value through every call
/// boundary. Absence of a principal means "unauthenticated", which is
/// distinct from "authenticated but forbidden".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: GlobalRole,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == GlobalRole::Admin
    }
}
