//! Database input types for aura-core.

use serde::{Deserialize, Serialize};

use crate::auth::{Action, Role};

/// Project visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    Private,
    /// Any user may read
    Public,
}

impl AccessLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Private),
            "public" => Some(Self::Public),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

/// Input for creating a project
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub owner_id: String,
    pub title: Option<String>,
    pub client: Option<String>,
    pub description: Option<String>,
    pub access_level: AccessLevel,
}

/// A collaborator's access entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub project_id: String,
    pub user_id: String,
    pub role: Role,
    pub permissions: Vec<Action>,
    pub granted_by: Option<String>,
    pub granted_at: i64,
}
