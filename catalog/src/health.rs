//! Driver health checks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum HealthStatus {
    Ready,
    Unavailable(String),
}

impl HealthStatus {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        HealthStatus::Unavailable(reason.into())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, HealthStatus::Ready)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Ready => f.write_str("ready"),
            HealthStatus::Unavailable(reason) => write!(f, "unavailable ({})", reason),
        }
    }
}

/// Reports whether a driver can currently serve sessions.
///
/// Checks run outside every catalog lock and should not panic. A check that
/// cannot reach its dependency reports [`HealthStatus::Unavailable`].
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> HealthStatus;
}

/// A fixed status, for drivers with no runtime dependency.
#[derive(Debug, Clone)]
pub struct StaticHealth(HealthStatus);

impl StaticHealth {
    pub fn ready() -> Self {
        Self(HealthStatus::Ready)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self(HealthStatus::unavailable(reason))
    }
}

#[async_trait]
impl HealthCheck for StaticHealth {
    async fn check(&self) -> HealthStatus {
        self.0.clone()
    }
}
