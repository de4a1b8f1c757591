//! Driver/protocol catalog.
//!
//! Protocol drivers register a [`ProtocolDescriptor`] and a [`HealthCheck`]
//! into a [`DriverRegistry`] at bootstrap. [`Catalog::bootstrap`] checks every
//! driver, mirrors one [`ConnectionProtocol`] row per driver into a
//! [`CatalogStore`] and keeps an in-memory snapshot for the decision engine.
//!
//! A protocol is available only when its driver is healthy *and*
//! administrators have not disabled it. The two flags are kept apart so a
//! rejection can say which one failed.

pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod health;
pub mod monitor;
pub mod registry;
pub mod settings;
pub mod store;

pub use catalog::{AvailabilityTransition, Catalog};
pub use descriptor::{Capabilities, ProtocolDescriptor};
pub use error::{CatalogError, Result};
pub use health::{HealthCheck, HealthStatus, StaticHealth};
pub use monitor::{HealthMonitor, DEFAULT_HEALTH_CHECK_INTERVAL};
pub use registry::DriverRegistry;
pub use settings::{ProtocolSettings, ProtocolToggle};
pub use store::{CatalogStore, ConnectionProtocol, MemoryCatalogStore};
