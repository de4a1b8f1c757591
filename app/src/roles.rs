//! Role administration.
//!
//! Writes go to the role store first and only then to the resolver, so a
//! failed write never leaves the in-memory table ahead of what is persisted.

use authz::builtin::{CONNECTION_VIEW, CONNECT_SUFFIX, SESSION_VIEW};
use permissions::{PermissionError, PermissionRegistry, Resolver, Role, RoleStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const ADMIN_ROLE: &str = "admin";
pub const USER_ROLE: &str = "user";

/// Roles created on first start.
///
/// `admin` is a system role holding every registered permission. `user` may
/// see connections and sessions and launch every registered protocol.
pub fn default_roles(registry: &PermissionRegistry) -> Vec<Role> {
    let mut admin = Role::new(ADMIN_ROLE, "Administrator")
        .with_description("Full access to every connection, protocol and session")
        .system();
    let mut user = Role::new(USER_ROLE, "User")
        .with_description("Launch sessions on connections shared with them")
        .with_permission(CONNECTION_VIEW)
        .with_permission(SESSION_VIEW);

    for definition in registry.definitions() {
        admin.permissions.insert(definition.id.clone());
        if definition.id.ends_with(CONNECT_SUFFIX) {
            user.permissions.insert(definition.id.clone());
        }
    }

    vec![admin, user]
}

pub struct RoleManager {
    store: Arc<dyn RoleStore>,
    resolver: Arc<Resolver>,
}

impl RoleManager {
    pub fn new(store: Arc<dyn RoleStore>, resolver: Arc<Resolver>) -> Self {
        Self { store, resolver }
    }

    /// Loads persisted roles into the resolver.
    ///
    /// Permissions that are no longer registered (a driver was removed since
    /// the role was saved) are dropped from the loaded role with a warning
    /// instead of failing the whole bootstrap.
    pub async fn load(&self) -> permissions::Result<usize> {
        let registry = self.resolver.registry().clone();
        let roles = self.store.load_roles().await?;
        let count = roles.len();

        for mut role in roles {
            let unknown: Vec<String> = role
                .permissions
                .iter()
                .filter(|id| !registry.contains(id))
                .cloned()
                .collect();
            for id in &unknown {
                warn!("Role {} references unregistered permission {}", role.id, id);
                role.permissions.remove(id);
            }
            self.resolver.upsert_role(role)?;
        }

        info!("Loaded {} roles", count);
        Ok(count)
    }

    pub fn role(&self, role_id: &str) -> Option<Role> {
        self.resolver.role(role_id)
    }

    pub fn roles(&self) -> Vec<Role> {
        self.resolver.roles()
    }

    /// Creates or replaces a role.
    pub async fn save(&self, role: Role) -> permissions::Result<()> {
        self.validate(&role.permissions)?;
        if let Some(existing) = self.resolver.role(&role.id) {
            if existing.system && !role.system {
                return Err(PermissionError::SystemRole(role.id));
            }
        }

        self.store.save_role(&role).await?;
        info!(target: "audit", role = %role.id, "Role saved");
        self.resolver.upsert_role(role)
    }

    /// Replaces the whole permission set of an existing role.
    pub async fn replace_permissions(
        &self,
        role_id: &str,
        permissions: BTreeSet<String>,
    ) -> permissions::Result<Role> {
        self.validate(&permissions)?;
        let mut role = self
            .resolver
            .role(role_id)
            .ok_or_else(|| PermissionError::RoleNotFound(role_id.to_string()))?;
        role.permissions = permissions.clone();

        self.store.save_role(&role).await?;
        info!(
            target: "audit",
            role = %role_id,
            permissions = role.permissions.len(),
            "Role permissions replaced"
        );
        self.resolver.replace_role_permissions(role_id, permissions)
    }

    /// Deletes a non-system role.
    pub async fn delete(&self, role_id: &str) -> permissions::Result<Role> {
        match self.resolver.role(role_id) {
            None => return Err(PermissionError::RoleNotFound(role_id.to_string())),
            Some(role) if role.system => return Err(PermissionError::SystemRole(role_id.to_string())),
            Some(_) => {}
        }

        self.store.delete_role(role_id).await?;
        info!(target: "audit", role = %role_id, "Role deleted");
        self.resolver.delete_role(role_id)
    }

    fn validate(&self, permissions: &BTreeSet<String>) -> permissions::Result<()> {
        let registry = self.resolver.registry();
        match permissions.iter().find(|id| !registry.contains(id)) {
            Some(id) => Err(PermissionError::UnknownPermission(id.clone())),
            None => Ok(()),
        }
    }
}
