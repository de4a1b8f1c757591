//! Permission dependency graph and effective-permission resolution.
//!
//! Feature modules register [`PermissionDefinition`]s on a
//! [`PermissionRegistryBuilder`] at startup. Sealing the builder validates the
//! depends-on graph (no dangling edges, no cycles) and yields the immutable
//! [`PermissionRegistry`]. The [`Resolver`] combines the registry with the
//! role table to answer "does this principal hold this permission".
//!
//! Holding a permission implies holding everything it depends on:
//!
//! ```rust
//! use permissions::{PermissionDefinition, PermissionRegistryBuilder, Principal, Resolver, Role};
//! use std::sync::Arc;
//!
//! let mut builder = PermissionRegistryBuilder::new();
//! builder.register(PermissionDefinition::new("connection.view", "connection", "View")).unwrap();
//! builder
//!     .register(
//!         PermissionDefinition::new("connection.manage", "connection", "Manage")
//!             .depends_on("connection.view"),
//!     )
//!     .unwrap();
//! let registry = Arc::new(builder.seal().unwrap());
//!
//! let resolver = Resolver::new(registry);
//! resolver
//!     .upsert_role(Role::new("editor", "Editor").with_permission("connection.manage"))
//!     .unwrap();
//!
//! let principal = Principal::user("u1").with_role("editor");
//! assert!(resolver.check(&principal, "connection.view"));
//! ```

pub mod error;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod types;

pub use error::{PermissionError, Result};
pub use registry::{PermissionRegistry, PermissionRegistryBuilder};
pub use resolver::Resolver;
pub use store::{MemoryRoleStore, RoleStore};
pub use types::{PermissionDefinition, Principal, Role};
