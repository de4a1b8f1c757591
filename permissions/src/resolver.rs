//! Effective-permission resolution for principals.
//!
//! The resolver keeps the role table and the closure of every role's
//! permission set. Closures are computed when a role is written, inside the
//! same write lock that stores the role, so readers always observe a role and
//! its closure together.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::error::{PermissionError, Result};
use crate::registry::PermissionRegistry;
use crate::store::RoleStore;
use crate::types::{Principal, Role};

#[derive(Debug, Default)]
struct RoleTable {
    roles: HashMap<String, Role>,
    closures: HashMap<String, Arc<BTreeSet<String>>>,
}

/// Answers capability checks against the sealed registry.
#[derive(Debug)]
pub struct Resolver {
    registry: Arc<PermissionRegistry>,
    table: RwLock<RoleTable>,
}

impl Resolver {
    pub fn new(registry: Arc<PermissionRegistry>) -> Self {
        Self {
            registry,
            table: RwLock::new(RoleTable::default()),
        }
    }

    /// Loads every persisted role into the table.
    pub async fn load_from(&self, store: &dyn RoleStore) -> Result<usize> {
        let roles = store.load_roles().await?;
        let count = roles.len();
        for role in roles {
            self.upsert_role(role)?;
        }
        info!("Loaded {} roles into the resolver", count);
        Ok(count)
    }

    pub fn registry(&self) -> &Arc<PermissionRegistry> {
        &self.registry
    }

    /// Inserts or replaces a role, recomputing its closure.
    pub fn upsert_role(&self, role: Role) -> Result<()> {
        self.validate(&role.permissions)?;
        let closure = Arc::new(self.registry.closure(&role.permissions));

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        debug!(
            "Caching closure of role {} ({} permissions)",
            role.id,
            closure.len()
        );
        table.closures.insert(role.id.clone(), closure);
        table.roles.insert(role.id.clone(), role);
        Ok(())
    }

    /// Replaces the whole permission set of an existing role.
    pub fn replace_role_permissions(&self, role_id: &str, permissions: BTreeSet<String>) -> Result<Role> {
        self.validate(&permissions)?;
        let closure = Arc::new(self.registry.closure(&permissions));

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let role = table
            .roles
            .get_mut(role_id)
            .ok_or_else(|| PermissionError::RoleNotFound(role_id.to_string()))?;
        role.permissions = permissions;
        let updated = role.clone();
        table.closures.insert(role_id.to_string(), closure);

        info!("Replaced permission set of role {}", role_id);
        Ok(updated)
    }

    /// Removes a non-system role.
    pub fn delete_role(&self, role_id: &str) -> Result<Role> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        match table.roles.get(role_id) {
            None => return Err(PermissionError::RoleNotFound(role_id.to_string())),
            Some(role) if role.system => {
                return Err(PermissionError::SystemRole(role_id.to_string()))
            }
            Some(_) => {}
        }

        table.closures.remove(role_id);
        let removed = table
            .roles
            .remove(role_id)
            .ok_or_else(|| PermissionError::RoleNotFound(role_id.to_string()))?;
        info!("Deleted role {}", role_id);
        Ok(removed)
    }

    pub fn role(&self, role_id: &str) -> Option<Role> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.roles.get(role_id).cloned()
    }

    /// All roles ordered by identifier.
    pub fn roles(&self) -> Vec<Role> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut roles: Vec<Role> = table.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.id.cmp(&b.id));
        roles
    }

    /// Union of the cached closures of every role the principal holds.
    ///
    /// Unknown role identifiers contribute nothing.
    pub fn effective_permissions(&self, principal: &Principal) -> BTreeSet<String> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        principal
            .roles
            .iter()
            .filter_map(|role_id| table.closures.get(role_id))
            .flat_map(|closure| closure.iter().cloned())
            .collect()
    }

    /// Root principals pass every check.
    pub fn check(&self, principal: &Principal, permission: &str) -> bool {
        if principal.is_root {
            return true;
        }

        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        principal
            .roles
            .iter()
            .filter_map(|role_id| table.closures.get(role_id))
            .any(|closure| closure.contains(permission))
    }

    fn validate(&self, permissions: &BTreeSet<String>) -> Result<()> {
        match permissions.iter().find(|id| !self.registry.contains(id)) {
            Some(unknown) => Err(PermissionError::UnknownPermission(unknown.clone())),
            None => Ok(()),
        }
    }
}
