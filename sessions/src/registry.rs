//! Concurrent registry of live sessions.
//!
//! The map is split into shards, each behind its own `tokio::sync::RwLock`.
//! A scan holds one shard's read lock at a time, so heartbeats on other shards
//! are never blocked by it. Check-and-remove decisions are made under the
//! shard write lock, which makes overlapping sweeps harmless. Events are
//! published after every lock is released.

use chrono::{DateTime, Utc};
use hub::{Broadcaster, SESSION_CLOSED, SESSION_OPENED};
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, SessionError};
use crate::types::{ActiveSessionRecord, SessionId};

pub const DEFAULT_SHARD_COUNT: usize = 16;

#[derive(Debug, Default)]
struct Shard {
    sessions: HashMap<SessionId, ActiveSessionRecord>,
    /// Every id closed in this process; never pruned
    closed: HashSet<SessionId>,
}

/// True when strictly more than `limit` has passed between `since` and `now`.
fn elapsed_beyond(since: DateTime<Utc>, now: DateTime<Utc>, limit: Duration) -> bool {
    (now - since)
        .to_std()
        .map(|elapsed| elapsed > limit)
        .unwrap_or(false)
}

pub struct SessionRegistry {
    shards: Vec<RwLock<Shard>>,
    hub: Arc<dyn Broadcaster>,
}

impl SessionRegistry {
    pub fn new(hub: Arc<dyn Broadcaster>) -> Self {
        Self::with_shards(hub, DEFAULT_SHARD_COUNT)
    }

    pub fn with_shards(hub: Arc<dyn Broadcaster>, shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| RwLock::new(Shard::default()))
            .collect();
        Self { shards, hub }
    }

    fn shard(&self, id: &SessionId) -> &RwLock<Shard> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Inserts or overwrites a record.
    ///
    /// `session.opened` is published on first insertion, and again when a
    /// re-registration changes the connection or the user. Identical
    /// re-registration overwrites silently.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionClosed`] when the id has been closed before,
    /// however long ago.
    pub async fn register(&self, record: ActiveSessionRecord) -> Result<()> {
        let payload = serde_json::to_value(&record)?;

        let publish = {
            let mut shard = self.shard(&record.id).write().await;
            if shard.closed.contains(&record.id) {
                return Err(SessionError::SessionClosed(record.id.to_string()));
            }

            match shard.sessions.insert(record.id.clone(), record.clone()) {
                None => true,
                Some(previous) => {
                    previous.connection_id != record.connection_id
                        || previous.user_id != record.user_id
                }
            }
        };

        if publish {
            info!(
                "Session {} opened by {} on {} ({})",
                record.id, record.user_id, record.connection_id, record.protocol_id
            );
            self.hub.broadcast(SESSION_OPENED, payload);
        } else {
            debug!("Session {} re-registered", record.id);
        }
        Ok(())
    }

    pub async fn heartbeat(&self, id: &SessionId) -> bool {
        self.heartbeat_at(id, Utc::now()).await
    }

    /// Refreshes `last_seen_at`. Unknown ids are ignored and return `false`.
    pub async fn heartbeat_at(&self, id: &SessionId, now: DateTime<Utc>) -> bool {
        let mut shard = self.shard(id).write().await;
        match shard.sessions.get_mut(id) {
            Some(record) => {
                record.last_seen_at = now;
                true
            }
            None => false,
        }
    }

    /// Removes a session and publishes `session.closed`. Removing an absent
    /// session does nothing.
    pub async fn unregister(&self, id: &SessionId) -> Option<ActiveSessionRecord> {
        let removed = {
            let mut shard = self.shard(id).write().await;
            let removed = shard.sessions.remove(id);
            if removed.is_some() {
                shard.closed.insert(id.clone());
            }
            removed
        };

        if let Some(record) = &removed {
            info!("Session {} closed", record.id);
            self.hub.broadcast(
                SESSION_CLOSED,
                json!({ "id": record.id, "connection_id": record.connection_id }),
            );
        }
        removed
    }

    pub async fn get(&self, id: &SessionId) -> Option<ActiveSessionRecord> {
        self.shard(id).read().await.sessions.get(id).cloned()
    }

    /// Sessions owned by the user or scoped to one of the teams, oldest first.
    pub async fn list_active(&self, user_id: &str, team_ids: &[String]) -> Vec<ActiveSessionRecord> {
        let mut result = Vec::new();
        for shard in &self.shards {
            let shard = shard.read().await;
            result.extend(
                shard
                    .sessions
                    .values()
                    .filter(|record| record.visible_to(user_id, team_ids))
                    .cloned(),
            );
        }
        result.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        result
    }

    /// Every live session, oldest first.
    pub async fn all(&self) -> Vec<ActiveSessionRecord> {
        let mut result = Vec::new();
        for shard in &self.shards {
            result.extend(shard.read().await.sessions.values().cloned());
        }
        result.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        result
    }

    pub async fn cleanup_stale(&self, grace: Duration) -> Vec<ActiveSessionRecord> {
        self.cleanup_stale_at(grace, Utc::now()).await
    }

    /// Removes sessions silent for longer than `grace` and publishes
    /// `session.closed` with reason `timeout` for each.
    pub async fn cleanup_stale_at(&self, grace: Duration, now: DateTime<Utc>) -> Vec<ActiveSessionRecord> {
        let mut removed = Vec::new();

        for shard in &self.shards {
            let mut shard = shard.write().await;
            let stale: Vec<SessionId> = shard
                .sessions
                .values()
                .filter(|record| elapsed_beyond(record.last_seen_at, now, grace))
                .map(|record| record.id.clone())
                .collect();

            for id in stale {
                if let Some(record) = shard.sessions.remove(&id) {
                    shard.closed.insert(id);
                    removed.push(record);
                }
            }
        }

        for record in &removed {
            info!(
                "Session {} timed out (last seen {})",
                record.id, record.last_seen_at
            );
            self.hub.broadcast(
                SESSION_CLOSED,
                json!({
                    "id": record.id,
                    "connection_id": record.connection_id,
                    "reason": "timeout",
                }),
            );
        }
        removed
    }

    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.sessions.len();
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
