//! Broker bootstrap.
//!
//! Ties the permission registry, protocol catalog, resource access control,
//! decision engine and session registry together over one SQLite database,
//! and runs their housekeeping loops.
//!
//! ```no_run
//! use broker::{Broker, BrokerConfig};
//! use catalog::{DriverRegistry, ProtocolDescriptor, StaticHealth};
//! use std::sync::Arc;
//!
//! # async fn example() -> broker::Result<()> {
//! let mut drivers = DriverRegistry::new();
//! drivers.register(
//!     ProtocolDescriptor::new("ssh", "ssh", "SSH", "shell"),
//!     Arc::new(StaticHealth::ready()),
//! )?;
//!
//! let broker = Broker::start(BrokerConfig::from_env()?, drivers).await?;
//! let tasks = broker.spawn_background_tasks();
//! # tasks.shutdown();
//! # Ok(())
//! # }
//! ```

mod broker;
pub mod config;
pub mod error;
pub mod logging;
pub mod roles;
pub mod tasks;

pub use broker::{build_permission_registry, Broker, LaunchOutcome, SessionRequest};
pub use config::{AccessConfig, BrokerConfig, CatalogConfig, LoggingConfig, SessionConfig};
pub use error::{BrokerError, Result};
pub use roles::{default_roles, RoleManager, ADMIN_ROLE, USER_ROLE};
pub use tasks::{BackgroundTasks, GrantPurger, DEFAULT_GRANT_PURGE_INTERVAL};

use catalog::DriverRegistry;

/// Runs the broker until ctrl-c.
///
/// Loads configuration from the environment, installs logging, starts the
/// core and its background tasks, then shuts everything down in reverse order.
pub async fn run(drivers: DriverRegistry) -> Result<()> {
    let config = BrokerConfig::from_env()?;
    let _guard = logging::init_logging(&config.logging)?;

    tracing::info!("Database path: {:?}", config.database.database_path);
    tracing::info!(
        "Health checks every {}s, session sweep every {}s",
        config.catalog.health_check_interval_secs,
        config.sessions.cleanup_interval_secs
    );

    let broker = Broker::start(config, drivers).await?;
    let tasks = broker.spawn_background_tasks();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    tasks.shutdown();
    broker.shutdown().await;
    Ok(())
}
