//! Error types for resource access control and availability decisions.
//!
//! # Security Note
//! Denials are not errors. A denied launch is a [`Decision`](crate::Decision)
//! with a reason code. The variants below are either recoverable state errors
//! returned by share operations or collaborator failures, which must reach the
//! caller as errors so infrastructure trouble is never reported as "denied".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    /// The grantee type/id pair does not resolve to a known principal.
    #[error("Invalid principal: {principal_type}:{id}")]
    InvalidPrincipal { principal_type: String, id: String },

    /// An identical active grant already exists. Callers should update its
    /// expiry instead of creating another one.
    #[error("Permission already granted (grant {0})")]
    AlreadyGranted(String),

    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    /// The requested expiry is not in the future.
    #[error("Grant expiry must be in the future")]
    InvalidExpiry,

    #[error("Grant not found: {0}")]
    GrantNotFound(String),

    /// The team-membership provider failed.
    #[error("Membership lookup failed: {0}")]
    Membership(String),

    /// The resource directory failed.
    #[error("Resource lookup failed: {0}")]
    Directory(String),

    /// The grant store failed.
    #[error("Grant store error: {0}")]
    Store(String),

    /// Protocol status could not be read.
    #[error("Protocol catalog error: {0}")]
    Catalog(String),

    /// The caller-supplied deadline elapsed before a decision was reached.
    #[error("Authorization decision timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl AuthzError {
    /// Transient errors are worth retrying with backoff at the boundary.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthzError::Membership(_)
                | AuthzError::Directory(_)
                | AuthzError::Store(_)
                | AuthzError::Catalog(_)
                | AuthzError::Timeout(_)
        )
    }
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
