//! Role persistence.

use async_trait::async_trait;
use permissions::{Role, RoleStore};
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::{Database, Result};

/// [`RoleStore`] over the `roles` and `role_permissions` tables.
#[derive(Debug, Clone)]
pub struct SqliteRoleStore {
    db: Database,
}

impl SqliteRoleStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query("SELECT id, name, description, system FROM roles ORDER BY id")
            .fetch_all(self.db.pool())
            .await?;

        let mut roles: BTreeMap<String, Role> = BTreeMap::new();
        for row in rows {
            let id: String = row.try_get("id")?;
            let mut role = Role::new(id.clone(), row.try_get::<String, _>("name")?)
                .with_description(row.try_get::<String, _>("description")?);
            role.system = row.try_get("system")?;
            roles.insert(id, role);
        }

        let assignments = sqlx::query("SELECT role_id, permission_id FROM role_permissions")
            .fetch_all(self.db.pool())
            .await?;
        for row in assignments {
            let role_id: String = row.try_get("role_id")?;
            if let Some(role) = roles.get_mut(&role_id) {
                role.permissions.insert(row.try_get("permission_id")?);
            }
        }

        Ok(roles.into_values().collect())
    }

    /// Writes the role and replaces its whole permission set in one transaction.
    pub async fn save(&self, role: &Role) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, description, system)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                system = excluded.system,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&role.id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.system)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(&role.id)
            .execute(&mut *tx)
            .await?;

        for permission in &role.permissions {
            sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
                .bind(&role.id)
                .bind(permission)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(
            "Saved role {} with {} permissions",
            role.id,
            role.permissions.len()
        );
        Ok(())
    }

    pub async fn delete(&self, role_id: &str) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!("Deleted role {}", role_id);
        }
        Ok(deleted)
    }

    /// Inserts the given roles unless a role with the same id already exists.
    ///
    /// An existing system role gains every permission of its template that it
    /// lacks, so permissions of drivers registered since the last start reach
    /// it. Other existing roles are left untouched. Returns the number of
    /// roles written.
    pub async fn seed(&self, roles: &[Role]) -> Result<usize> {
        let stored: BTreeMap<String, Role> = self
            .list()
            .await?
            .into_iter()
            .map(|role| (role.id.clone(), role))
            .collect();

        let mut written = 0;
        for role in roles {
            match stored.get(&role.id) {
                None => {
                    self.save(role).await?;
                    info!("Created default role: {}", role.id);
                    written += 1;
                }
                Some(existing) if role.system => {
                    let missing: Vec<&String> = role
                        .permissions
                        .difference(&existing.permissions)
                        .collect();
                    if missing.is_empty() {
                        continue;
                    }
                    let mut updated = existing.clone();
                    updated.permissions.extend(missing.iter().map(|id| id.to_string()));
                    self.save(&updated).await?;
                    info!(
                        "System role {} gained {} permissions",
                        role.id,
                        missing.len()
                    );
                    written += 1;
                }
                Some(_) => {}
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl RoleStore for SqliteRoleStore {
    async fn load_roles(&self) -> permissions::Result<Vec<Role>> {
        Ok(self.list().await?)
    }

    async fn save_role(&self, role: &Role) -> permissions::Result<()> {
        Ok(self.save(role).await?)
    }

    async fn delete_role(&self, role_id: &str) -> permissions::Result<bool> {
        Ok(self.delete(role_id).await?)
    }
}
