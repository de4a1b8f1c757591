use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The id belongs to a session that was closed recently. Session ids are
    /// never reused.
    #[error("Session {0} is closed")]
    SessionClosed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for session registry operations.
pub type Result<T> = std::result::Result<T, SessionError>;
