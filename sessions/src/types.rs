use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// A fresh ULID, sortable by creation time.
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A live session as tracked in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSessionRecord {
    pub id: SessionId,
    pub connection_id: String,
    pub user_id: String,

    /// Team scope the session is visible to, if any
    pub team_id: Option<String>,

    pub protocol_id: String,
    pub started_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ActiveSessionRecord {
    pub fn new(
        id: SessionId,
        connection_id: impl Into<String>,
        user_id: impl Into<String>,
        protocol_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            connection_id: connection_id.into(),
            user_id: user_id.into(),
            team_id: None,
            protocol_id: protocol_id.into(),
            started_at: now,
            last_seen_at: now,
            host: None,
            port: None,
        }
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    /// Sets both `started_at` and `last_seen_at`.
    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = at;
        self.last_seen_at = at;
        self
    }

    /// Whether `user_id` owns the session or one of `team_ids` scopes it.
    pub fn visible_to(&self, user_id: &str, team_ids: &[String]) -> bool {
        self.user_id == user_id
            || self
                .team_id
                .as_ref()
                .map(|team| team_ids.contains(team))
                .unwrap_or(false)
    }
}
