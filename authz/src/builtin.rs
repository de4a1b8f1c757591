//! Permissions declared by the connection and session modules.

use permissions::PermissionDefinition;

pub const CONNECTION_VIEW: &str = "connection.view";
pub const CONNECTION_MANAGE: &str = "connection.manage";
pub const CONNECTION_SHARE: &str = "connection.share";
pub const SESSION_VIEW: &str = "session.view";
pub const SESSION_TERMINATE: &str = "session.terminate";

/// Suffix every protocol driver uses for its launch permission.
pub const CONNECT_SUFFIX: &str = ".connect";

/// The launch permission of a protocol (e.g. "ssh" -> "ssh.connect").
pub fn connect_permission(protocol_id: &str) -> String {
    format!("{}{}", protocol_id, CONNECT_SUFFIX)
}

/// Core definitions registered before any driver contributes its own.
pub fn core_permissions() -> Vec<PermissionDefinition> {
    vec![
        PermissionDefinition::new(CONNECTION_VIEW, "connection", "See connections and their details"),
        PermissionDefinition::new(
            CONNECTION_MANAGE,
            "connection",
            "Create, edit and delete connections",
        )
        .depends_on(CONNECTION_VIEW),
        PermissionDefinition::new(
            CONNECTION_SHARE,
            "connection",
            "Grant other principals access to connections",
        )
        .depends_on(CONNECTION_MANAGE),
        PermissionDefinition::new(SESSION_VIEW, "session", "List live sessions"),
        PermissionDefinition::new(SESSION_TERMINATE, "session", "Close live sessions of others")
            .depends_on(SESSION_VIEW),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use permissions::PermissionRegistryBuilder;

    #[test]
    fn test_core_permissions_seal() {
        let mut builder = PermissionRegistryBuilder::new();
        builder.register_all(core_permissions()).unwrap();
        let registry = builder.seal().unwrap();

        let closure = registry.closure([CONNECTION_SHARE]);
        assert!(closure.contains(CONNECTION_MANAGE));
        assert!(closure.contains(CONNECTION_VIEW));
    }

    #[test]
    fn test_connect_permission() {
        assert_eq!(connect_permission("ssh"), "ssh.connect");
        assert_eq!(connect_permission("k8s-exec"), "k8s-exec.connect");
    }
}
