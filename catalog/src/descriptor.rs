//! Protocol descriptors declared by drivers at bootstrap.

use authz::builtin::{connect_permission, CONNECTION_VIEW};
use permissions::PermissionDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a protocol can do once launched.
///
/// Every flag defaults to `false`. A driver that declares nothing is assumed
/// to support nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub terminal: bool,
    pub desktop: bool,
    pub file_transfer: bool,
    pub clipboard: bool,
    pub recording: bool,
    pub metrics: bool,
    pub reconnect: bool,

    /// Driver-specific flags
    pub extra: BTreeMap<String, bool>,
}

impl Capabilities {
    /// Looks up a flag by name, including `extra` flags. Unknown names are false.
    pub fn has(&self, flag: &str) -> bool {
        match flag {
            "terminal" => self.terminal,
            "desktop" => self.desktop,
            "file_transfer" => self.file_transfer,
            "clipboard" => self.clipboard,
            "recording" => self.recording,
            "metrics" => self.metrics,
            "reconnect" => self.reconnect,
            other => self.extra.get(other).copied().unwrap_or(false),
        }
    }

    pub fn with_extra(mut self, flag: impl Into<String>, enabled: bool) -> Self {
        self.extra.insert(flag.into(), enabled);
        self
    }
}

/// Static description of a protocol driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDescriptor {
    pub id: String,
    pub module: String,
    pub title: String,
    pub category: String,

    #[serde(default)]
    pub capabilities: Capabilities,

    #[serde(default)]
    pub sort_order: i64,

    /// Definitions this driver contributes to the permission registry
    #[serde(default)]
    pub permissions: Vec<PermissionDefinition>,

    /// Bootstrap fails if a mandatory driver is unhealthy
    #[serde(default)]
    pub mandatory: bool,
}

impl ProtocolDescriptor {
    /// Creates a descriptor that contributes its `<id>.connect` permission.
    pub fn new(
        id: impl Into<String>,
        module: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let connect = PermissionDefinition::new(
            connect_permission(&id),
            id.clone(),
            format!("Launch {} sessions", id),
        )
        .depends_on(CONNECTION_VIEW);

        Self {
            id,
            module: module.into(),
            title: title.into(),
            category: category.into(),
            capabilities: Capabilities::default(),
            sort_order: 0,
            permissions: vec![connect],
            mandatory: false,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_permission(mut self, definition: PermissionDefinition) -> Self {
        self.permissions.push(definition);
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// The launch permission checked by the decision engine.
    pub fn connect_permission(&self) -> String {
        connect_permission(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_default_to_false() {
        let descriptor = ProtocolDescriptor::new("ssh", "ssh", "SSH", "shell");
        assert_eq!(descriptor.capabilities, Capabilities::default());
        assert!(!descriptor.capabilities.has("terminal"));
        assert!(!descriptor.capabilities.has("port_forwarding"));
    }

    #[test]
    fn test_capabilities_deserialize_partially() {
        let caps: Capabilities =
            serde_json::from_str(r#"{"terminal": true, "extra": {"port_forwarding": true}}"#).unwrap();
        assert!(caps.has("terminal"));
        assert!(caps.has("port_forwarding"));
        assert!(!caps.desktop);
        assert!(!caps.has("recording"));
    }

    #[test]
    fn test_descriptor_contributes_connect_permission() {
        let descriptor = ProtocolDescriptor::new("rdp", "rdp", "Remote Desktop", "desktop")
            .with_permission(PermissionDefinition::new("rdp.record", "rdp", "Record sessions"));

        assert_eq!(descriptor.connect_permission(), "rdp.connect");
        let ids: Vec<&str> = descriptor.permissions.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["rdp.connect", "rdp.record"]);
        assert!(descriptor.permissions[0].depends_on.contains(CONNECTION_VIEW));
    }
}
