//! Bootstrap and runtime errors of the broker.
//!
//! Everything returned while [`Broker::start`](crate::Broker::start) runs is
//! fatal: the process must not serve launches with a half-built core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// The configuration file is missing a required value or holds an invalid one.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("Logging initialization failed: {0}")]
    Logging(String),

    /// A session was scoped to a team the requesting user does not belong to.
    #[error("User {user_id} is not a member of team {team_id}")]
    NotTeamMember { user_id: String, team_id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] database::DatabaseError),

    #[error(transparent)]
    Permission(#[from] permissions::PermissionError),

    #[error(transparent)]
    Authz(#[from] authz::AuthzError),

    #[error(transparent)]
    Catalog(#[from] catalog::CatalogError),

    #[error(transparent)]
    Session(#[from] sessions::SessionError),
}

pub type Result<T> = std::result::Result<T, BrokerError>;
