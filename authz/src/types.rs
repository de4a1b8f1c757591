//! Core types for resource-level access control.
//!
//! # Security Considerations
//!
//! ## Principal identity
//! - The [`Principal`](permissions::Principal) passed to every check must come
//!   from an authenticated session, never from request input
//! - Team memberships are always looked up, never trusted from the caller
//!
//! ## Resource typing
//! - `resource_type` is an open string tag so new resource kinds can be shared
//!   without touching this crate. Conventional values are `connection` and
//!   `folder`
//!
//! ## Grant lifetime
//! - A grant is active while `expires_at` is unset or in the future
//! - Expired grants stay in storage until the housekeeping purge runs; every
//!   read path filters them out at evaluation time

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Conventional resource type tag for connections.
pub const RESOURCE_CONNECTION: &str = "connection";

/// Conventional resource type tag for folders.
pub const RESOURCE_FOLDER: &str = "folder";

/// Identifies a resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: String,

    /// Open tag (e.g. "connection", "folder")
    pub resource_type: String,
}

impl ResourceRef {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
        }
    }

    pub fn connection(id: impl Into<String>) -> Self {
        Self::new(id, RESOURCE_CONNECTION)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

/// The kinds of principal a grant can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    User,
    Team,
    Role,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::User => "user",
            PrincipalType::Team => "team",
            PrincipalType::Role => "role",
        }
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(PrincipalType::User),
            "team" => Ok(PrincipalType::Team),
            "role" => Ok(PrincipalType::Role),
            other => Err(format!("unknown principal type: {}", other)),
        }
    }
}

/// A typed principal reference, as stored on a grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalRef {
    pub principal_type: PrincipalType,
    pub id: String,
}

impl PrincipalRef {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            principal_type: PrincipalType::User,
            id: id.into(),
        }
    }

    pub fn team(id: impl Into<String>) -> Self {
        Self {
            principal_type: PrincipalType::Team,
            id: id.into(),
        }
    }

    pub fn role(id: impl Into<String>) -> Self {
        Self {
            principal_type: PrincipalType::Role,
            id: id.into(),
        }
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.principal_type, self.id)
    }
}

/// Parses the `type:id` form (e.g. "team:T1").
impl FromStr for PrincipalRef {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("expected type:id, got {}", s))?;
        if id.is_empty() {
            return Err(format!("empty principal id in {}", s));
        }
        Ok(Self {
            principal_type: kind.parse()?,
            id: id.to_string(),
        })
    }
}

/// Who owns a resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOwnership {
    pub owner_id: String,
    pub team_id: Option<String>,
}

/// A single explicit grant row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePermission {
    pub id: String,
    pub resource: ResourceRef,
    pub principal: PrincipalRef,

    /// The permission this grant satisfies, together with everything it implies
    pub permission_id: String,

    pub granted_by: String,
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl ResourcePermission {
    /// Active while the expiry is unset or strictly in the future.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at > now,
        }
    }
}

/// Input for creating a grant.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareRequest {
    pub resource: ResourceRef,
    pub grantee: PrincipalRef,
    pub permission_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_by: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ShareRequest {
    pub fn new(
        resource: ResourceRef,
        grantee: PrincipalRef,
        permission_id: impl Into<String>,
        granted_by: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            grantee,
            permission_id: permission_id.into(),
            expires_at: None,
            granted_by: granted_by.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
