//! Persistence seam for roles.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::Role;

/// Storage for role definitions.
///
/// Implementations must persist the permission set as a whole, never as
/// incremental additions or removals.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn load_roles(&self) -> Result<Vec<Role>>;

    /// Inserts the role or replaces it entirely.
    async fn save_role(&self, role: &Role) -> Result<()>;

    /// Returns whether a role was removed.
    async fn delete_role(&self, role_id: &str) -> Result<bool>;
}

/// Process-local role storage used by tests and embedded setups.
#[derive(Debug, Default)]
pub struct MemoryRoleStore {
    roles: RwLock<BTreeMap<String, Role>>,
}

impl MemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn load_roles(&self) -> Result<Vec<Role>> {
        Ok(self.roles.read().await.values().cloned().collect())
    }

    async fn save_role(&self, role: &Role) -> Result<()> {
        self.roles
            .write()
            .await
            .insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn delete_role(&self, role_id: &str) -> Result<bool> {
        Ok(self.roles.write().await.remove(role_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_replaces_whole_role() {
        let store = MemoryRoleStore::new();
        store
            .save_role(&Role::new("editor", "Editor").with_permission("connection.manage"))
            .await
            .unwrap();
        store
            .save_role(&Role::new("editor", "Editor").with_permission("connection.view"))
            .await
            .unwrap();

        let roles = store.load_roles().await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].permissions.len(), 1);
        assert!(roles[0].permissions.contains("connection.view"));

        assert!(store.delete_role("editor").await.unwrap());
        assert!(!store.delete_role("editor").await.unwrap());
    }
}
