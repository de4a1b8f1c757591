//! The assembled broker core.

use authz::builtin::core_permissions;
use authz::{
    Decision, DecisionEngine, DenyReason, ResourceAccessControl, ResourcePermission, ResourceRef,
    ShareRequest,
};
use catalog::{Catalog, DriverRegistry, HealthMonitor};
use database::{
    initialize_database, Database, SqliteCatalogStore, SqliteDirectory, SqliteGrantStore,
    SqliteRoleStore,
};
use hub::EventHub;
use permissions::{PermissionRegistry, PermissionRegistryBuilder, Principal, Resolver};
use serde::{Deserialize, Serialize};
use sessions::{ActiveSessionRecord, SessionId, SessionRegistry, SessionSweeper};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::roles::{default_roles, RoleManager};
use crate::tasks::{BackgroundTasks, GrantPurger};

/// What the caller wants to launch once the decision allows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub protocol_id: String,
    pub connection_id: String,
    /// Team the session is scoped to, if any
    pub team_id: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl SessionRequest {
    pub fn new(protocol_id: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            protocol_id: protocol_id.into(),
            connection_id: connection_id.into(),
            team_id: None,
            host: None,
            port: None,
        }
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    pub fn resource(&self) -> ResourceRef {
        ResourceRef::connection(self.connection_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LaunchOutcome {
    Opened(ActiveSessionRecord),
    Denied { reason: DenyReason },
}

/// Access control and session broker built on one SQLite database.
///
/// # Architecture Overview
///
/// ```text
///   launch request
///        |
///        v
///   DecisionEngine ----> Resolver (roles, in memory)
///        |          \--> Catalog snapshot (in memory)
///        |           \-> ResourceAccessControl --> grants / directory (SQLite)
///        v
///   SessionRegistry --> EventHub (session.opened / session.closed)
/// ```
///
/// Protocol drivers are registered by the embedding process before
/// [`Broker::start`]; their declared permissions join the core permissions
/// before the registry is sealed.
pub struct Broker {
    config: BrokerConfig,
    database: Arc<Database>,
    hub: Arc<EventHub>,
    resolver: Arc<Resolver>,
    roles: RoleManager,
    catalog: Arc<Catalog>,
    directory: Arc<SqliteDirectory>,
    access: Arc<ResourceAccessControl>,
    decisions: DecisionEngine,
    sessions: Arc<SessionRegistry>,
}

impl Broker {
    /// Builds the core in dependency order.
    ///
    /// # Errors
    ///
    /// Every error is a bootstrap failure: invalid permission graph, a
    /// mandatory driver failing its first health check, or an unusable
    /// database.
    pub async fn start(config: BrokerConfig, drivers: DriverRegistry) -> Result<Self> {
        info!("=== Broker starting up ===");
        config.validate()?;

        let database = initialize_database(&config.database).await?;

        let registry = Arc::new(build_permission_registry(&drivers)?);
        info!("Permission registry sealed with {} permissions", registry.len());

        let role_store = Arc::new(SqliteRoleStore::new(database.as_ref().clone()));
        let seeded = role_store.seed(&default_roles(&registry)).await?;
        if seeded > 0 {
            info!("Seeded or updated {} default roles", seeded);
        }
        let resolver = Arc::new(Resolver::new(registry.clone()));
        let roles = RoleManager::new(role_store, resolver.clone());
        roles.load().await?;

        let hub = Arc::new(EventHub::default());
        let catalog = Arc::new(
            Catalog::bootstrap(
                drivers,
                Arc::new(SqliteCatalogStore::new(database.as_ref().clone())),
                hub.clone(),
                config.catalog.protocols.clone(),
            )
            .await?,
        );

        let directory = Arc::new(SqliteDirectory::new(database.as_ref().clone()));
        let access = Arc::new(ResourceAccessControl::new(
            registry,
            Arc::new(SqliteGrantStore::new(database.as_ref().clone())),
            directory.clone(),
            directory.clone(),
        ));
        let decisions = DecisionEngine::new(resolver.clone(), access.clone(), catalog.clone());

        let sessions = Arc::new(SessionRegistry::new(hub.clone()));

        info!("=== Broker started ===");
        Ok(Self {
            config,
            database,
            hub,
            resolver,
            roles,
            catalog,
            directory,
            access,
            decisions,
            sessions,
        })
    }

    /// Runs the availability decision under the configured timeout.
    pub async fn decide(
        &self,
        principal: &Principal,
        protocol_id: &str,
        resource: &ResourceRef,
    ) -> Result<Decision> {
        let decision = self
            .decisions
            .decide_within(
                self.config.access.decision_timeout(),
                principal,
                protocol_id,
                resource,
            )
            .await?;
        Ok(decision)
    }

    /// Decides and, when allowed, registers a new live session.
    ///
    /// A team scope must name one of the requesting user's teams.
    /// The caller starts the driver session after an `Opened` outcome and must
    /// call [`close_session`](Self::close_session) when it ends.
    pub async fn open_session(
        &self,
        principal: &Principal,
        request: SessionRequest,
    ) -> Result<LaunchOutcome> {
        if let Some(team_id) = &request.team_id {
            let teams = self.directory.teams_for_user(&principal.id).await?;
            if !teams.contains(team_id) {
                warn!("Refused session scope {} for {}", team_id, principal.id);
                return Err(BrokerError::NotTeamMember {
                    user_id: principal.id.clone(),
                    team_id: team_id.clone(),
                });
            }
        }

        let decision = self
            .decide(principal, &request.protocol_id, &request.resource())
            .await?;
        if let Some(reason) = decision.reason {
            return Ok(LaunchOutcome::Denied { reason });
        }

        let mut record = ActiveSessionRecord::new(
            SessionId::generate(),
            request.connection_id,
            principal.id.clone(),
            request.protocol_id,
        );
        record.team_id = request.team_id;
        record.host = request.host;
        record.port = request.port;

        self.sessions.register(record.clone()).await?;
        info!(
            "Opened session {} ({} on {}) for {}",
            record.id, record.protocol_id, record.connection_id, record.user_id
        );
        Ok(LaunchOutcome::Opened(record))
    }

    pub async fn heartbeat(&self, session_id: &SessionId) -> bool {
        self.sessions.heartbeat(session_id).await
    }

    pub async fn close_session(&self, session_id: &SessionId) -> Option<ActiveSessionRecord> {
        self.sessions.unregister(session_id).await
    }

    /// Live sessions the user owns or that are scoped to one of their teams.
    pub async fn sessions_for(&self, user_id: &str) -> Result<Vec<ActiveSessionRecord>> {
        let teams = self.directory.teams_for_user(user_id).await?;
        Ok(self.sessions.list_active(user_id, &teams).await)
    }

    pub async fn share(&self, request: ShareRequest) -> Result<ResourcePermission> {
        Ok(self.access.share(request).await?)
    }

    pub async fn revoke(&self, grant_id: &str) -> Result<()> {
        Ok(self.access.revoke(grant_id).await?)
    }

    /// Starts the health monitor, the session sweeper and the grant purge.
    pub fn spawn_background_tasks(&self) -> BackgroundTasks {
        let monitor =
            HealthMonitor::spawn(self.catalog.clone(), self.config.catalog.health_check_interval());
        let sweeper = SessionSweeper::spawn(
            self.sessions.clone(),
            self.config.sessions.cleanup_interval(),
            self.config.sessions.grace_period(),
        );
        let purger = GrantPurger::spawn(self.access.clone(), self.config.access.grant_purge_interval());
        BackgroundTasks {
            monitor,
            sweeper,
            purger,
        }
    }

    /// Closes every live session and the database pool.
    pub async fn shutdown(self) {
        let live = self.sessions.all().await;
        if !live.is_empty() {
            warn!("Closing {} live sessions on shutdown", live.len());
        }
        for record in live {
            self.sessions.unregister(&record.id).await;
        }
        self.database.close().await;
        crate::logging::log_shutdown();
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn roles(&self) -> &RoleManager {
        &self.roles
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn directory(&self) -> &Arc<SqliteDirectory> {
        &self.directory
    }

    pub fn access(&self) -> &Arc<ResourceAccessControl> {
        &self.access
    }

    pub fn decisions(&self) -> &DecisionEngine {
        &self.decisions
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }
}

/// Core permissions first, then every driver's contribution, then seal.
pub fn build_permission_registry(drivers: &DriverRegistry) -> Result<PermissionRegistry> {
    let mut builder = PermissionRegistryBuilder::new();
    builder.register_all(core_permissions())?;
    let contributed = drivers.contribute_permissions(&mut builder)?;
    info!(
        "{} drivers contributed {} permissions",
        drivers.len(),
        contributed
    );
    Ok(builder.seal()?)
}
