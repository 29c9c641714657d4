//! Actors and roles for backup and restore authorization.
//!
//! Authentication itself happens outside this subsystem; callers hand in
//! an already-established [`Actor`]. Scheduled runs use the distinguished
//! system actor rather than a magic user id, so audit entries and
//! permission checks treat it like any other identity.

use serde::{Deserialize, Serialize};

/// Permission level of an actor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including restores.
    Admin,
    /// May start backups but not restore them.
    Editor,
    /// Read-only access; may do neither.
    Viewer,
    /// Internal identity used for scheduled jobs.
    System,
}

/// An established caller identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: &str, role: Role) -> Self {
        Self {
            id: id.to_string(),
            role,
        }
    }

    /// The fixed identity used by the scheduler for automatic backups.
    pub fn system() -> Self {
        Self {
            id: "system".to_string(),
            role: Role::System,
        }
    }

    /// Editors and above may create backups.
    pub fn can_start_backup(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Editor | Role::System)
    }

    /// Restoring is destructive and held to a stricter bar than backup
    /// creation: admins and the system actor only.
    pub fn can_restore(&self) -> bool {
        matches!(self.role, Role::Admin | Role::System)
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
