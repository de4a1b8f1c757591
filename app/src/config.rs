//! Broker configuration.
//!
//! Configuration is read from a YAML file (default `config/broker.yaml`,
//! overridable through `BROKER_CONFIG`). A `.env` file in the working
//! directory is loaded first. Every section is optional and falls back to the
//! defaults below.
//!
//! ```yaml
//! database:
//!   database_path: data/broker.db
//! logging:
//!   level: info
//!   directory: data/logs
//! catalog:
//!   health_check_interval_secs: 3600
//!   protocols:
//!     telnet: { enabled: false }
//! sessions:
//!   cleanup_interval_secs: 60
//!   grace_period_secs: 300
//! access:
//!   decision_timeout_ms: 2000
//!   grant_purge_interval_secs: 3600
//! ```
//!
//! Paths and the log level can be overridden from the environment with
//! `BROKER_DATABASE_PATH`, `BROKER_LOG_DIR` and `BROKER_LOG_LEVEL`.

use catalog::ProtocolSettings;
use database::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{BrokerError, Result};

pub const CONFIG_PATH_VAR: &str = "BROKER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/broker.yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
    pub sessions: SessionConfig,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
    pub directory: PathBuf,
    pub file_prefix: String,
    /// Also log to stdout
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::from("data").join("logs"),
            file_prefix: "broker".to_string(),
            console: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub health_check_interval_secs: u64,
    /// Administrative enablement per protocol id
    pub protocols: ProtocolSettings,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: catalog::DEFAULT_HEALTH_CHECK_INTERVAL.as_secs(),
            protocols: ProtocolSettings::default(),
        }
    }
}

impl CatalogConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cleanup_interval_secs: u64,
    pub grace_period_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: sessions::DEFAULT_CLEANUP_INTERVAL.as_secs(),
            grace_period_secs: sessions::DEFAULT_GRACE_PERIOD.as_secs(),
        }
    }
}

impl SessionConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Upper bound for one launch decision
    pub decision_timeout_ms: u64,
    pub grant_purge_interval_secs: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            decision_timeout_ms: 2000,
            grant_purge_interval_secs: crate::tasks::DEFAULT_GRANT_PURGE_INTERVAL.as_secs(),
        }
    }
}

impl AccessConfig {
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    pub fn grant_purge_interval(&self) -> Duration {
        Duration::from_secs(self.grant_purge_interval_secs)
    }
}

impl BrokerConfig {
    /// Loads `.env`, reads the configuration file named by `BROKER_CONFIG`
    /// (or the default path) and applies environment overrides.
    ///
    /// A missing file is not an error; the defaults are used instead.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = PathBuf::from(path);

        let mut config = if path.exists() {
            Self::load(&path)?
        } else {
            info!("No configuration file at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_overrides(|name| env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates one YAML file. Environment overrides are not applied.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading broker configuration from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: BrokerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `BROKER_*` overrides resolved through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("BROKER_DATABASE_PATH") {
            debug!("Database path overridden from environment: {}", path);
            self.database.database_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("BROKER_LOG_DIR") {
            self.logging.directory = PathBuf::from(dir);
        }
        if let Some(level) = lookup("BROKER_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Rejects values the background tasks cannot run with.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("catalog.health_check_interval_secs", self.catalog.health_check_interval_secs),
            ("sessions.cleanup_interval_secs", self.sessions.cleanup_interval_secs),
            ("access.grant_purge_interval_secs", self.access.grant_purge_interval_secs),
            ("access.decision_timeout_ms", self.access.decision_timeout_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(BrokerError::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.database.database_path.as_os_str().is_empty() {
            return Err(BrokerError::Config("database.database_path is empty".into()));
        }
        Ok(())
    }
}
