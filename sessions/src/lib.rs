//! Active session registry.
//!
//! Tracks live sessions in memory only. A session is registered after a
//! successful launch, kept alive by heartbeats, and removed either explicitly
//! or by the [`SessionSweeper`] once its heartbeats stop for longer than the
//! grace period. Lifecycle changes are broadcast on the hub as
//! `session.opened` and `session.closed`.
//!
//! Each session id moves through Unregistered, Active and Closed exactly once.
//! Closed ids are remembered for the life of the registry so they can never
//! be registered again.

pub mod error;
pub mod registry;
pub mod sweeper;
pub mod types;

pub use error::{Result, SessionError};
pub use registry::{SessionRegistry, DEFAULT_SHARD_COUNT};
pub use sweeper::{SessionSweeper, DEFAULT_CLEANUP_INTERVAL, DEFAULT_GRACE_PERIOD};
pub use types::{ActiveSessionRecord, SessionId};
