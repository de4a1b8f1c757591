//! Periodic removal of abandoned sessions.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::registry::SessionRegistry;

pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Heartbeat silence after which a session is considered abandoned.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(300);

/// Runs [`SessionRegistry::cleanup_stale`] on a fixed interval.
pub struct SessionSweeper {
    handle: JoinHandle<()>,
}

impl SessionSweeper {
    pub fn spawn(registry: Arc<SessionRegistry>, interval: Duration, grace: Duration) -> Self {
        info!(
            "Starting session sweeper every {:?} with grace period {:?}",
            interval, grace
        );
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let removed = registry.cleanup_stale(grace).await;
                if !removed.is_empty() {
                    info!("Swept {} stale sessions", removed.len());
                } else {
                    debug!("No stale sessions");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActiveSessionRecord;
    use chrono::Utc;
    use hub::EventHub;

    #[tokio::test]
    async fn test_sweeper_removes_silent_sessions() {
        let registry = Arc::new(SessionRegistry::new(Arc::new(EventHub::default())));
        let long_ago = Utc::now() - chrono::Duration::minutes(30);
        registry
            .register(ActiveSessionRecord::new("old".into(), "c1", "u1", "ssh").started_at(long_ago))
            .await
            .unwrap();
        registry
            .register(ActiveSessionRecord::new("fresh".into(), "c2", "u1", "ssh"))
            .await
            .unwrap();

        let sweeper = SessionSweeper::spawn(
            registry.clone(),
            Duration::from_millis(20),
            DEFAULT_GRACE_PERIOD,
        );
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(sweeper.is_running());
        sweeper.shutdown();

        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&"fresh".into()).await.is_some());
    }
}
