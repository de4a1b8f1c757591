use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

pub mod catalog_store;
pub mod directory;
pub mod error;
pub mod grants;
pub mod init;
pub mod roles;
mod schema;

pub use catalog_store::SqliteCatalogStore;
pub use directory::SqliteDirectory;
pub use error::{DatabaseError, Result};
pub use grants::SqliteGrantStore;
pub use init::{initialize_database, DatabaseConfig};
pub use roles::SqliteRoleStore;

/// Tables every broker database must contain.
pub const REQUIRED_TABLES: &[&str] = &[
    "connection_protocols",
    "resource_permissions",
    "roles",
    "role_permissions",
    "users",
    "teams",
    "team_members",
    "resource_owners",
];

/// Database connection pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Opens (creating if needed) the SQLite file at `database_path`.
    pub async fn new(database_path: &str) -> Result<Self> {
        Self::connect(database_path, 5).await
    }

    pub async fn connect(database_path: &str, max_connections: u32) -> Result<Self> {
        // Ensure the data directory exists
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Connecting to database at: {}", database_path);

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        debug!("Database connection established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Creates every broker table. Safe to run on every start.
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");
        for (index, statement) in schema::STATEMENTS.iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::Migration(format!("statement {}: {}", index + 1, e)))?;
        }
        info!("Database migrations completed");
        Ok(())
    }

    /// Check if a table exists
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let query = r#"
            SELECT COUNT(*) as count
            FROM sqlite_master
            WHERE type='table' AND name=?
        "#;

        let result: (i32,) = sqlx::query_as(query)
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0 > 0)
    }

    /// Required tables that are missing.
    pub async fn missing_tables(&self) -> Result<Vec<&'static str>> {
        let mut missing = Vec::new();
        for table in REQUIRED_TABLES {
            if !self.table_exists(table).await? {
                missing.push(*table);
            }
        }
        Ok(missing)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Fixed-width RFC 3339 text, so stored timestamps compare correctly as strings.
pub(crate) fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| DatabaseError::InvalidValue(format!("timestamp {}: {}", raw, e)))
}
