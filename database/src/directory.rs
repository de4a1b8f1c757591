//! Users, teams and resource owners.

use async_trait::async_trait;
use authz::{
    AuthzError, MembershipProvider, PrincipalRef, PrincipalType, ResourceDirectory,
    ResourceOwnership, ResourceRef,
};
use sqlx::Row;
use tracing::debug;

use crate::{Database, Result};

/// Directory backed by the `users`, `teams`, `team_members`, `roles` and
/// `resource_owners` tables.
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    db: Database,
}

impl SqliteDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn add_user(&self, id: &str, username: &str, is_root: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, is_root) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET username = excluded.username, is_root = excluded.is_root
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(is_root)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn add_team(&self, id: &str, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO teams (id, name) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(id)
        .bind(name)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn add_member(&self, team_id: &str, user_id: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO team_members (team_id, user_id) VALUES (?, ?)")
            .bind(team_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        debug!("Added {} to team {}", user_id, team_id);
        Ok(())
    }

    pub async fn remove_member(&self, team_id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = ? AND user_id = ?")
            .bind(team_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_owner(
        &self,
        resource: &ResourceRef,
        owner_id: &str,
        team_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resource_owners (resource_id, resource_type, owner_id, team_id)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(resource_type, resource_id) DO UPDATE SET
                owner_id = excluded.owner_id,
                team_id = excluded.team_id
            "#,
        )
        .bind(&resource.id)
        .bind(&resource.resource_type)
        .bind(owner_id)
        .bind(team_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn teams_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT team_id FROM team_members WHERE user_id = ? ORDER BY team_id")
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("team_id").map_err(Into::into))
            .collect()
    }

    /// Whether the user is flagged as root. Unknown users are not.
    pub async fn is_root(&self, user_id: &str) -> Result<bool> {
        let root = sqlx::query_scalar::<_, bool>("SELECT is_root FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(root.unwrap_or(false))
    }

    pub async fn exists(&self, principal: &PrincipalRef) -> Result<bool> {
        let sql = match principal.principal_type {
            PrincipalType::User => "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)",
            PrincipalType::Team => "SELECT EXISTS(SELECT 1 FROM teams WHERE id = ?)",
            PrincipalType::Role => "SELECT EXISTS(SELECT 1 FROM roles WHERE id = ?)",
        };
        let exists = sqlx::query_scalar::<_, bool>(sql)
            .bind(&principal.id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }

    pub async fn owner_of(&self, resource: &ResourceRef) -> Result<Option<ResourceOwnership>> {
        let row = sqlx::query(
            "SELECT owner_id, team_id FROM resource_owners WHERE resource_type = ? AND resource_id = ?",
        )
        .bind(&resource.resource_type)
        .bind(&resource.id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(ResourceOwnership {
                owner_id: row.try_get("owner_id")?,
                team_id: row.try_get("team_id")?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl MembershipProvider for SqliteDirectory {
    async fn teams_of(&self, user_id: &str) -> authz::Result<Vec<String>> {
        self.teams_for_user(user_id)
            .await
            .map_err(|e| AuthzError::Membership(e.to_string()))
    }

    async fn principal_exists(&self, principal: &PrincipalRef) -> authz::Result<bool> {
        self.exists(principal)
            .await
            .map_err(|e| AuthzError::Membership(e.to_string()))
    }
}

#[async_trait]
impl ResourceDirectory for SqliteDirectory {
    async fn ownership(&self, resource: &ResourceRef) -> authz::Result<Option<ResourceOwnership>> {
        self.owner_of(resource)
            .await
            .map_err(|e| AuthzError::Directory(e.to_string()))
    }
}
