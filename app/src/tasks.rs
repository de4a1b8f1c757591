//! Background housekeeping owned by a running broker.

use authz::ResourceAccessControl;
use catalog::HealthMonitor;
use chrono::Utc;
use sessions::SessionSweeper;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

pub const DEFAULT_GRANT_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Deletes expired grants on a fixed interval.
///
/// Reads ignore expired grants on their own; this only keeps the table small.
pub struct GrantPurger {
    handle: JoinHandle<()>,
}

impl GrantPurger {
    pub fn spawn(access: Arc<ResourceAccessControl>, interval: Duration) -> Self {
        info!("Starting grant purge every {:?}", interval);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match access.purge_expired(Utc::now()).await {
                    Ok(0) => debug!("No expired grants"),
                    Ok(purged) => info!("Purged {} expired grants", purged),
                    Err(e) => error!("Grant purge failed: {}", e),
                }
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

/// Handles of every loop started by [`Broker::spawn_background_tasks`](crate::Broker::spawn_background_tasks).
pub struct BackgroundTasks {
    pub(crate) monitor: HealthMonitor,
    pub(crate) sweeper: SessionSweeper,
    pub(crate) purger: GrantPurger,
}

impl BackgroundTasks {
    pub fn is_running(&self) -> bool {
        self.monitor.is_running() && self.sweeper.is_running() && self.purger.is_running()
    }

    pub fn shutdown(self) {
        self.monitor.shutdown();
        self.sweeper.shutdown();
        self.purger.shutdown();
        info!("Background tasks stopped");
    }
}
