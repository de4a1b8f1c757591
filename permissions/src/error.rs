//! Error types for the permission registry and resolver.
//!
//! Registration and sealing errors are configuration errors: the process must
//! refuse to start when one of them surfaces during bootstrap.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PermissionError {
    /// A permission with this identifier was already registered.
    #[error("Permission already registered: {0}")]
    DuplicateDefinition(String),

    /// A permission depends on an identifier that was never registered.
    #[error("Permission {permission} depends on unknown permission {dependency}")]
    UnknownDependency {
        permission: String,
        dependency: String,
    },

    /// The depends-on graph contains a cycle. The path is closed by repeating
    /// its first identifier.
    #[error("Cyclic permission dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// System roles cannot be deleted.
    #[error("Role {0} is a system role")]
    SystemRole(String),

    #[error("Role store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, PermissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_lists_path() {
        let err = PermissionError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "c".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Cyclic permission dependency: a -> b -> c -> a");
    }

    #[test]
    fn test_unknown_dependency_display() {
        let err = PermissionError::UnknownDependency {
            permission: "ssh.connect".into(),
            dependency: "connection.view".into(),
        };
        assert_eq!(
            err.to_string(),
            "Permission ssh.connect depends on unknown permission connection.view"
        );
    }
}
