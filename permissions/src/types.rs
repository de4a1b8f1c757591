//! Core types shared by the registry and the resolver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A declared capability and the capabilities it depends on.
///
/// Holding a permission implies holding everything it depends on,
/// transitively. Feature modules declare their definitions once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    /// Dot-namespaced identifier (e.g. "connection.manage")
    pub id: String,

    /// The module that declared this permission
    pub module: String,

    /// Human readable description
    pub description: String,

    /// Identifiers this permission directly depends on
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
}

impl PermissionDefinition {
    /// Creates a definition with no dependencies.
    pub fn new(
        id: impl Into<String>,
        module: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            module: module.into(),
            description: description.into(),
            depends_on: BTreeSet::new(),
        }
    }

    /// Adds a direct dependency edge.
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.insert(id.into());
        self
    }
}

/// A named set of directly assigned permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,

    /// System roles are seeded by the broker and cannot be deleted
    #[serde(default)]
    pub system: bool,

    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            system: false,
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_permission(mut self, id: impl Into<String>) -> Self {
        self.permissions.insert(id.into());
        self
    }

    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }
}

/// The user on whose behalf a check is made.
///
/// Team memberships are not carried here; they are looked up through the
/// membership provider when a resource decision needs them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,

    /// Root principals bypass permission and resource-access gates
    #[serde(default)]
    pub is_root: bool,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    /// Creates a regular user principal without roles.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_root: false,
            roles: Vec::new(),
        }
    }

    /// Creates a root principal.
    pub fn root(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_root: true,
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role_id: impl Into<String>) -> Self {
        self.roles.push(role_id.into());
        self
    }

    pub fn holds_role(&self, role_id: &str) -> bool {
        self.roles.iter().any(|r| r == role_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_builder() {
        let def = PermissionDefinition::new("connection.manage", "connection", "Manage connections")
            .depends_on("connection.view");
        assert_eq!(def.id, "connection.manage");
        assert!(def.depends_on.contains("connection.view"));
    }

    #[test]
    fn test_principal_helpers() {
        let user = Principal::user("u1").with_role("viewer");
        assert!(!user.is_root);
        assert!(user.holds_role("viewer"));
        assert!(!user.holds_role("editor"));

        let root = Principal::root("admin");
        assert!(root.is_root);
        assert!(root.roles.is_empty());
    }

    #[test]
    fn test_role_deserializes_with_defaults() {
        let role: Role = serde_json::from_str(r#"{"id": "viewer", "name": "Viewer"}"#).unwrap();
        assert!(!role.system);
        assert!(role.permissions.is_empty());
    }
}
