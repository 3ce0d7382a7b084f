//! Project access control.
//!
//! Every project-scoped operation asks an [`AccessControl`] oracle whether a
//! user may perform an [`Action`] on a project before any project data is read.
//! The SQLite [`Database`](crate::db::Database) implements the oracle with
//! owner / role / public-read semantics; callers may plug in any other.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Action a user wants to perform on a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Write,
    Delete,
    ManageAccess,
    Admin,
    Export,
    Archive,
}

impl Action {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "delete" => Some(Self::Delete),
            "manage_access" => Some(Self::ManageAccess),
            "admin" => Some(Self::Admin),
            "export" => Some(Self::Export),
            "archive" => Some(Self::Archive),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::ManageAccess => "manage_access",
            Self::Admin => "admin",
            Self::Export => "export",
            Self::Archive => "archive",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Project role granted to a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    /// Permissions granted by this role when none are given explicitly
    pub fn default_permissions(&self) -> &'static [Action] {
        match self {
            Self::Owner => &[
                Action::Read,
                Action::Write,
                Action::Delete,
                Action::ManageAccess,
                Action::Admin,
                Action::Export,
                Action::Archive,
            ],
            Self::Editor => &[Action::Read, Action::Write, Action::Export],
            Self::Viewer => &[Action::Read],
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Allow/deny oracle for project-scoped operations.
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Whether `user_id` may perform `action` on `project_id`.
    async fn has_permission(&self, project_id: &str, user_id: &str, action: Action) -> Result<bool>;
}

/// Fail with [`Error::AccessDenied`] unless the oracle allows the action.
pub async fn authorize(
    access: &dyn AccessControl,
    project_id: &str,
    user_id: &str,
    action: Action,
) -> Result<()> {
    if access.has_permission(project_id, user_id, action).await? {
        Ok(())
    } else {
        tracing::warn!(project_id, user_id, action = %action, "access denied");
        Err(Error::access_denied(project_id, user_id, action))
    }
}
