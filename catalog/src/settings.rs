//! Administrative protocol toggles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolToggle {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Per-protocol enablement, keyed by protocol id.
///
/// Protocols without an entry are enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolSettings {
    protocols: BTreeMap<String, ProtocolToggle>,
}

impl ProtocolSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protocol(mut self, id: impl Into<String>, enabled: bool) -> Self {
        self.set(id, enabled);
        self
    }

    pub fn set(&mut self, id: impl Into<String>, enabled: bool) {
        self.protocols.insert(id.into(), ProtocolToggle { enabled });
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.protocols.get(id).map(|t| t.enabled).unwrap_or(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProtocolToggle)> {
        self.protocols.iter()
    }
}
