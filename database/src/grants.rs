//! Explicit resource grants.

use async_trait::async_trait;
use authz::{GrantStore, PrincipalRef, PrincipalType, ResourcePermission, ResourceRef};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use crate::{decode_timestamp, encode_timestamp, Database, DatabaseError, Result};

const SELECT_GRANT: &str = r#"
    SELECT id, resource_id, resource_type, principal_id, principal_type, permission_id,
           granted_by, expires_at, metadata, created_at
    FROM resource_permissions
"#;

/// [`GrantStore`] over the `resource_permissions` table.
#[derive(Debug, Clone)]
pub struct SqliteGrantStore {
    db: Database,
}

impl SqliteGrantStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert_grant(&self, grant: &ResourcePermission) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resource_permissions (
                id, resource_id, resource_type, principal_id, principal_type, permission_id,
                granted_by, expires_at, metadata, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&grant.id)
        .bind(&grant.resource.id)
        .bind(&grant.resource.resource_type)
        .bind(&grant.principal.id)
        .bind(grant.principal.principal_type.as_str())
        .bind(&grant.permission_id)
        .bind(&grant.granted_by)
        .bind(grant.expires_at.as_ref().map(encode_timestamp))
        .bind(serde_json::to_string(&grant.metadata)?)
        .bind(encode_timestamp(&grant.created_at))
        .execute(self.db.pool())
        .await?;

        debug!("Stored grant {}", grant.id);
        Ok(())
    }

    pub async fn get_grant(&self, grant_id: &str) -> Result<Option<ResourcePermission>> {
        let sql = format!("{} WHERE id = ?", SELECT_GRANT);
        let row = sqlx::query(&sql)
            .bind(grant_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(grant_from_row).transpose()
    }

    pub async fn find_grants(
        &self,
        resource: &ResourceRef,
        principals: &[PrincipalRef],
    ) -> Result<Vec<ResourcePermission>> {
        if principals.is_empty() {
            return Ok(Vec::new());
        }

        let principal_clauses = vec!["(principal_type = ? AND principal_id = ?)"; principals.len()];
        let sql = format!(
            "{} WHERE resource_type = ? AND resource_id = ? AND ({}) ORDER BY created_at",
            SELECT_GRANT,
            principal_clauses.join(" OR ")
        );

        let mut query = sqlx::query(&sql)
            .bind(&resource.resource_type)
            .bind(&resource.id);
        for principal in principals {
            query = query
                .bind(principal.principal_type.as_str())
                .bind(&principal.id);
        }

        let rows = query.fetch_all(self.db.pool()).await?;
        rows.iter().map(grant_from_row).collect()
    }

    pub async fn list_grants(&self, resource: &ResourceRef) -> Result<Vec<ResourcePermission>> {
        let sql = format!(
            "{} WHERE resource_type = ? AND resource_id = ? ORDER BY created_at",
            SELECT_GRANT
        );
        let rows = sqlx::query(&sql)
            .bind(&resource.resource_type)
            .bind(&resource.id)
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(grant_from_row).collect()
    }

    /// Every stored grant, expired ones included.
    pub async fn list_all(&self) -> Result<Vec<ResourcePermission>> {
        let sql = format!("{} ORDER BY resource_type, resource_id, created_at", SELECT_GRANT);
        let rows = sqlx::query(&sql).fetch_all(self.db.pool()).await?;
        rows.iter().map(grant_from_row).collect()
    }

    pub async fn set_expiry(&self, grant_id: &str, expires_at: Option<DateTime<Utc>>) -> Result<bool> {
        let result = sqlx::query("UPDATE resource_permissions SET expires_at = ? WHERE id = ?")
            .bind(expires_at.as_ref().map(encode_timestamp))
            .bind(grant_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_grant(&self, grant_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM resource_permissions WHERE id = ?")
            .bind(grant_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn purge(&self, now: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query(
            "DELETE FROM resource_permissions WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(encode_timestamp(&now))
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() as usize)
    }
}

fn grant_from_row(row: &SqliteRow) -> Result<ResourcePermission> {
    let principal_type: String = row.try_get("principal_type")?;
    let principal_type: PrincipalType = principal_type
        .parse()
        .map_err(DatabaseError::InvalidValue)?;

    let expires_at: Option<String> = row.try_get("expires_at")?;
    let metadata: String = row.try_get("metadata")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(ResourcePermission {
        id: row.try_get("id")?,
        resource: ResourceRef::new(
            row.try_get::<String, _>("resource_id")?,
            row.try_get::<String, _>("resource_type")?,
        ),
        principal: PrincipalRef {
            principal_type,
            id: row.try_get("principal_id")?,
        },
        permission_id: row.try_get("permission_id")?,
        granted_by: row.try_get("granted_by")?,
        expires_at: expires_at.as_deref().map(decode_timestamp).transpose()?,
        metadata: serde_json::from_str(&metadata)?,
        created_at: decode_timestamp(&created_at)?,
    })
}

#[async_trait]
impl GrantStore for SqliteGrantStore {
    async fn insert(&self, grant: &ResourcePermission) -> authz::Result<()> {
        Ok(self.insert_grant(grant).await?)
    }

    async fn get(&self, grant_id: &str) -> authz::Result<Option<ResourcePermission>> {
        Ok(self.get_grant(grant_id).await?)
    }

    async fn find(
        &self,
        resource: &ResourceRef,
        principals: &[PrincipalRef],
    ) -> authz::Result<Vec<ResourcePermission>> {
        Ok(self.find_grants(resource, principals).await?)
    }

    async fn list_for_resource(&self, resource: &ResourceRef) -> authz::Result<Vec<ResourcePermission>> {
        Ok(self.list_grants(resource).await?)
    }

    async fn update_expiry(
        &self,
        grant_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> authz::Result<bool> {
        Ok(self.set_expiry(grant_id, expires_at).await?)
    }

    async fn delete(&self, grant_id: &str) -> authz::Result<bool> {
        Ok(self.delete_grant(grant_id).await?)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> authz::Result<usize> {
        Ok(self.purge(now).await?)
    }
}
