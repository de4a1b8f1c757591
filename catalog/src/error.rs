use permissions::PermissionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Driver already registered: {0}")]
    DuplicateDriver(String),

    /// A driver marked mandatory failed its initial health check. Bootstrap
    /// must not continue in a partially available state.
    #[error("Mandatory driver {id} is unhealthy: {reason}")]
    MandatoryDriverUnhealthy { id: String, reason: String },

    #[error("Catalog store error: {0}")]
    Store(String),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),
}

/// A specialized Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
