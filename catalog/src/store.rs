//! Persisted mirror of the catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::Result;

/// One mirror row per protocol identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProtocol {
    pub id: String,
    pub title: String,
    pub category: String,
    pub sort_order: i64,

    /// From the driver's latest health check
    pub driver_enabled: bool,

    /// From administrative configuration
    pub config_enabled: bool,

    pub updated_at: DateTime<Utc>,
}

impl ConnectionProtocol {
    pub fn is_available(&self) -> bool {
        self.driver_enabled && self.config_enabled
    }
}

/// Upsert/query access to mirror rows.
///
/// Upserts are keyed by id and must be safe to repeat.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn upsert(&self, row: &ConnectionProtocol) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<ConnectionProtocol>>;

    /// Every row, including rows of drivers no longer registered.
    async fn list(&self) -> Result<Vec<ConnectionProtocol>>;
}

#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    rows: RwLock<BTreeMap<String, ConnectionProtocol>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn upsert(&self, row: &ConnectionProtocol) -> Result<()> {
        self.rows.write().await.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ConnectionProtocol>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<ConnectionProtocol>> {
        Ok(self.rows.read().await.values().cloned().collect())
    }
}
