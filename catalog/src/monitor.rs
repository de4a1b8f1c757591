//! Periodic health checks on a background task.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::catalog::Catalog;

/// Hourly, unless configured otherwise.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(3600);

/// Runs [`Catalog::refresh`] on a fixed interval.
///
/// The first tick is skipped because bootstrap has just checked every driver.
/// Failed refreshes are logged and retried on the next tick.
pub struct HealthMonitor {
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    pub fn spawn(catalog: Arc<Catalog>, interval: Duration) -> Self {
        info!("Starting catalog health monitor every {:?}", interval);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match catalog.refresh().await {
                    Ok(transitions) if transitions.is_empty() => {}
                    Ok(transitions) => {
                        info!("Health check changed availability of {} protocols", transitions.len())
                    }
                    Err(e) => error!("Catalog health check failed: {}", e),
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
