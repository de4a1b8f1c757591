//! The live catalog: health, settings and the availability snapshot.

use authz::{AuthzError, ProtocolStatus, ProtocolStatusSource};
use chrono::Utc;
use hub::{Broadcaster, PROTOCOL_AVAILABILITY_CHANGED};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::descriptor::ProtocolDescriptor;
use crate::error::{CatalogError, Result};
use crate::health::HealthStatus;
use crate::registry::DriverRegistry;
use crate::settings::ProtocolSettings;
use crate::store::{CatalogStore, ConnectionProtocol};

type Snapshot = Arc<BTreeMap<String, ConnectionProtocol>>;

/// A change of availability flags observed by a refresh or a settings update.
///
/// Serialized as the payload of `protocol.availability_changed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityTransition {
    pub id: String,
    pub driver_enabled: bool,
    pub config_enabled: bool,
    pub available: bool,
}

/// Registered drivers, their latest health, and the mirror snapshot the
/// decision engine reads.
///
/// The snapshot only ever contains registered protocols. Mirror rows of
/// drivers that are no longer registered stay in the store and are ignored.
pub struct Catalog {
    registry: DriverRegistry,
    store: Arc<dyn CatalogStore>,
    hub: Arc<dyn Broadcaster>,
    settings: RwLock<ProtocolSettings>,
    health: RwLock<BTreeMap<String, HealthStatus>>,
    snapshot: RwLock<Snapshot>,
    /// Serializes sync so snapshots are swapped in the order they were built
    sync_lock: Mutex<()>,
}

impl Catalog {
    /// Runs the initial health checks and the first sync.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::MandatoryDriverUnhealthy`] when a mandatory driver
    ///   fails its first check. Nothing is written to the store in that case.
    /// - [`CatalogError::Store`] when the mirror cannot be written
    pub async fn bootstrap(
        registry: DriverRegistry,
        store: Arc<dyn CatalogStore>,
        hub: Arc<dyn Broadcaster>,
        settings: ProtocolSettings,
    ) -> Result<Self> {
        let catalog = Self {
            registry,
            store,
            hub,
            settings: RwLock::new(settings),
            health: RwLock::new(BTreeMap::new()),
            snapshot: RwLock::new(Arc::new(BTreeMap::new())),
            sync_lock: Mutex::new(()),
        };

        let statuses = catalog.run_health_checks().await;
        for driver in catalog.registry.drivers() {
            let descriptor = &driver.descriptor;
            if !descriptor.mandatory {
                continue;
            }
            if let Some(HealthStatus::Unavailable(reason)) = statuses.get(&descriptor.id) {
                return Err(CatalogError::MandatoryDriverUnhealthy {
                    id: descriptor.id.clone(),
                    reason: reason.clone(),
                });
            }
        }

        let synced = catalog.sync().await?;
        info!("Catalog bootstrapped with {} protocols", synced);
        Ok(catalog)
    }

    /// Writes one mirror row per registered driver and swaps the snapshot.
    pub async fn sync(&self) -> Result<usize> {
        let _guard = self.sync_lock.lock().await;
        self.sync_locked().await
    }

    /// Re-runs every health check, re-syncs and publishes each change.
    pub async fn refresh(&self) -> Result<Vec<AvailabilityTransition>> {
        self.run_health_checks().await;

        let _guard = self.sync_lock.lock().await;
        let before = self.snapshot();
        self.sync_locked().await?;
        let transitions = diff(&before, &self.snapshot());
        self.publish(&transitions);
        Ok(transitions)
    }

    /// Replaces the administrative settings and re-syncs.
    ///
    /// When the sync fails the previous settings are restored and the
    /// snapshot is left as it was.
    pub async fn apply_settings(&self, settings: ProtocolSettings) -> Result<Vec<AvailabilityTransition>> {
        let _guard = self.sync_lock.lock().await;
        let before = self.snapshot();
        let previous = std::mem::replace(
            &mut *self.settings.write().unwrap_or_else(PoisonError::into_inner),
            settings,
        );
        if let Err(e) = self.sync_locked().await {
            warn!("Protocol settings not applied: {}", e);
            *self.settings.write().unwrap_or_else(PoisonError::into_inner) = previous;
            return Err(e);
        }
        let transitions = diff(&before, &self.snapshot());
        self.publish(&transitions);
        Ok(transitions)
    }

    pub fn row(&self, id: &str) -> Option<ConnectionProtocol> {
        self.snapshot().get(id).cloned()
    }

    /// Snapshot rows ordered by sort order, then id.
    pub fn rows(&self) -> Vec<ConnectionProtocol> {
        let mut rows: Vec<ConnectionProtocol> = self.snapshot().values().cloned().collect();
        rows.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
        rows
    }

    /// Every mirror row in the store, including rows of unregistered drivers.
    pub async fn stored_rows(&self) -> Result<Vec<ConnectionProtocol>> {
        self.store.list().await
    }

    pub fn descriptor(&self, id: &str) -> Option<Arc<ProtocolDescriptor>> {
        self.registry.descriptor(id)
    }

    /// Descriptors of available protocols, in display order.
    pub fn available_protocols(&self) -> Vec<Arc<ProtocolDescriptor>> {
        self.rows()
            .into_iter()
            .filter(ConnectionProtocol::is_available)
            .filter_map(|row| self.registry.descriptor(&row.id))
            .collect()
    }

    pub fn health_status(&self, id: &str) -> Option<HealthStatus> {
        self.health
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn settings(&self) -> ProtocolSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    fn snapshot(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Checks every driver without holding any lock, then records the results.
    async fn run_health_checks(&self) -> BTreeMap<String, HealthStatus> {
        let mut statuses = BTreeMap::new();
        for driver in self.registry.drivers() {
            let status = driver.health.check().await;
            match &status {
                HealthStatus::Ready => debug!("Driver {} is ready", driver.descriptor.id),
                HealthStatus::Unavailable(reason) => {
                    warn!("Driver {} is unavailable: {}", driver.descriptor.id, reason)
                }
            }
            statuses.insert(driver.descriptor.id.clone(), status);
        }

        *self.health.write().unwrap_or_else(PoisonError::into_inner) = statuses.clone();
        statuses
    }

    async fn sync_locked(&self) -> Result<usize> {
        let now = Utc::now();
        let rows: Vec<ConnectionProtocol> = {
            let health = self.health.read().unwrap_or_else(PoisonError::into_inner);
            let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
            self.registry
                .drivers()
                .map(|driver| {
                    let descriptor = &driver.descriptor;
                    ConnectionProtocol {
                        id: descriptor.id.clone(),
                        title: descriptor.title.clone(),
                        category: descriptor.category.clone(),
                        sort_order: descriptor.sort_order,
                        driver_enabled: health
                            .get(&descriptor.id)
                            .map(HealthStatus::is_ready)
                            .unwrap_or(false),
                        config_enabled: settings.is_enabled(&descriptor.id),
                        updated_at: now,
                    }
                })
                .collect()
        };

        for row in &rows {
            self.store.upsert(row).await?;
        }

        let count = rows.len();
        let snapshot: BTreeMap<String, ConnectionProtocol> =
            rows.into_iter().map(|row| (row.id.clone(), row)).collect();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);

        debug!("Synced {} catalog rows", count);
        Ok(count)
    }

    fn publish(&self, transitions: &[AvailabilityTransition]) {
        for transition in transitions {
            info!(
                target: "audit",
                protocol = %transition.id,
                driver_enabled = transition.driver_enabled,
                config_enabled = transition.config_enabled,
                available = transition.available,
                "Protocol availability changed"
            );
            match serde_json::to_value(transition) {
                Ok(payload) => self.hub.broadcast(PROTOCOL_AVAILABILITY_CHANGED, payload),
                Err(e) => warn!("Failed to serialize availability change: {}", e),
            }
        }
    }
}

/// Rows whose flags differ between two snapshots. Rows absent before are not
/// transitions.
fn diff(before: &Snapshot, after: &Snapshot) -> Vec<AvailabilityTransition> {
    after
        .values()
        .filter_map(|row| {
            let previous = before.get(&row.id)?;
            let changed = previous.driver_enabled != row.driver_enabled
                || previous.config_enabled != row.config_enabled;
            changed.then(|| AvailabilityTransition {
                id: row.id.clone(),
                driver_enabled: row.driver_enabled,
                config_enabled: row.config_enabled,
                available: row.is_available(),
            })
        })
        .collect()
}

impl ProtocolStatusSource for Catalog {
    fn protocol_status(&self, protocol_id: &str) -> authz::Result<Option<ProtocolStatus>> {
        let snapshot = self
            .snapshot
            .read()
            .map_err(|e| AuthzError::Catalog(e.to_string()))?;
        Ok(snapshot.get(protocol_id).map(|row| ProtocolStatus {
            driver_enabled: row.driver_enabled,
            config_enabled: row.config_enabled,
        }))
    }
}
