//! Resource access control and launch availability decisions for the broker.
//!
//! This crate answers two questions. [`ResourceAccessControl`] decides whether
//! a principal may act on a specific resource instance, combining ownership
//! with explicit, expiring grants. [`DecisionEngine`] decides whether a
//! principal may launch a protocol against a resource, combining the
//! permission resolver, the protocol catalog snapshot and resource access.
//!
//! # Architecture Overview
//!
//! A launch request follows this pattern:
//!
//! 1. **Request arrives** with an authenticated [`Principal`](permissions::Principal)
//! 2. **Catalog gates** check driver readiness and administrative enablement
//!    through a [`ProtocolStatusSource`]
//! 3. **Permission gate** asks the [`Resolver`](permissions::Resolver) for
//!    `connection.view` and `<protocol>.connect`
//! 4. **Resource gate** asks [`ResourceAccessControl`] whether the resource is
//!    visible to the principal
//! 5. **Decision** is returned: available, or the reason of the first failing gate
//!
//! # Security Architecture
//!
//! See `types.rs` for the rules on principal identity, resource typing and
//! grant lifetime. Denials are values, not errors: an `Err` always means a
//! collaborator (membership provider, resource directory, grant store,
//! catalog) could not be consulted.
//!
//! # Example
//!
//! ```rust
//! use authz::{PrincipalRef, ResourceRef, ShareRequest};
//!
//! let request = ShareRequest::new(
//!     ResourceRef::connection("conn-9"),
//!     PrincipalRef::team("T1"),
//!     "connection.view",
//!     "u1",
//! );
//! assert_eq!(request.grantee.to_string(), "team:T1");
//! ```

pub mod access;
pub mod builtin;
pub mod decision;
pub mod directory;
pub mod error;
pub mod memory;
pub mod types;

pub use access::{AccessBasis, ResourceAccessControl};
pub use decision::{
    Decision, DecisionEngine, DecisionStats, DecisionStatsSnapshot, DenyReason, ProtocolStatus,
    ProtocolStatusSource,
};
pub use directory::{GrantStore, MembershipProvider, ResourceDirectory};
pub use error::{AuthzError, Result};
pub use types::{
    PrincipalRef, PrincipalType, ResourceOwnership, ResourcePermission, ResourceRef, ShareRequest,
    RESOURCE_CONNECTION, RESOURCE_FOLDER,
};
