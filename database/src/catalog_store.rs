//! The persisted protocol catalog mirror.

use async_trait::async_trait;
use catalog::{CatalogStore, ConnectionProtocol};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::{decode_timestamp, encode_timestamp, Database, Result};

/// [`CatalogStore`] over the `connection_protocols` table.
#[derive(Debug, Clone)]
pub struct SqliteCatalogStore {
    db: Database,
}

impl SqliteCatalogStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Upsert keyed by id. Repeating the same write is harmless.
    pub async fn upsert_row(&self, row: &ConnectionProtocol) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO connection_protocols (
                id, title, category, sort_order, driver_enabled, config_enabled, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                category = excluded.category,
                sort_order = excluded.sort_order,
                driver_enabled = excluded.driver_enabled,
                config_enabled = excluded.config_enabled,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&row.id)
        .bind(&row.title)
        .bind(&row.category)
        .bind(row.sort_order)
        .bind(row.driver_enabled)
        .bind(row.config_enabled)
        .bind(encode_timestamp(&row.updated_at))
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn get_row(&self, id: &str) -> Result<Option<ConnectionProtocol>> {
        let row = sqlx::query(
            "SELECT id, title, category, sort_order, driver_enabled, config_enabled, updated_at \
             FROM connection_protocols WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        row.as_ref().map(protocol_from_row).transpose()
    }

    /// Rows ordered by sort order, then id.
    pub async fn list_rows(&self) -> Result<Vec<ConnectionProtocol>> {
        let rows = sqlx::query(
            "SELECT id, title, category, sort_order, driver_enabled, config_enabled, updated_at \
             FROM connection_protocols ORDER BY sort_order, id",
        )
        .fetch_all(self.db.pool())
        .await?;
        rows.iter().map(protocol_from_row).collect()
    }
}

fn protocol_from_row(row: &SqliteRow) -> Result<ConnectionProtocol> {
    let updated_at: String = row.try_get("updated_at")?;
    Ok(ConnectionProtocol {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        category: row.try_get("category")?,
        sort_order: row.try_get("sort_order")?,
        driver_enabled: row.try_get("driver_enabled")?,
        config_enabled: row.try_get("config_enabled")?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn upsert(&self, row: &ConnectionProtocol) -> catalog::Result<()> {
        Ok(self.upsert_row(row).await?)
    }

    async fn get(&self, id: &str) -> catalog::Result<Option<ConnectionProtocol>> {
        Ok(self.get_row(id).await?)
    }

    async fn list(&self) -> catalog::Result<Vec<ConnectionProtocol>> {
        Ok(self.list_rows().await?)
    }
}
