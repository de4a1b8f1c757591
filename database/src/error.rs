use authz::AuthzError;
use catalog::CatalogError;
use permissions::PermissionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded (bad timestamp, unknown enum tag)
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<DatabaseError> for PermissionError {
    fn from(e: DatabaseError) -> Self {
        PermissionError::Store(e.to_string())
    }
}

impl From<DatabaseError> for AuthzError {
    fn from(e: DatabaseError) -> Self {
        AuthzError::Store(e.to_string())
    }
}

impl From<DatabaseError> for CatalogError {
    fn from(e: DatabaseError) -> Self {
        CatalogError::Store(e.to_string())
    }
}
