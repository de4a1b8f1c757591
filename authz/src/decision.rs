//! The availability decision: may this principal use this protocol against
//! this resource?
//!
//! # Gates
//!
//! Evaluated in order, the first failing gate decides the reason:
//!
//! 1. **Driver ready**: the protocol has a catalog row and its driver is healthy
//! 2. **Config enabled**: administrators have not disabled the protocol
//! 3. **Permission granted**: the principal holds `connection.view` and
//!    `<protocol>.connect` (skipped for root)
//! 4. **Resource accessible**: the principal may view the target resource
//!
//! # Security Note
//!
//! Root principals still go through gates 1 and 2. A protocol whose driver is
//! down or which has been disabled is unavailable to everyone.

use chrono::{DateTime, Utc};
use permissions::{Principal, Resolver};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::access::ResourceAccessControl;
use crate::builtin::{connect_permission, CONNECTION_VIEW};
use crate::error::{AuthzError, Result};
use crate::types::ResourceRef;

/// Catalog state of one protocol, as seen by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStatus {
    pub driver_enabled: bool,
    pub config_enabled: bool,
}

impl ProtocolStatus {
    pub fn is_available(&self) -> bool {
        self.driver_enabled && self.config_enabled
    }
}

/// Read access to the protocol snapshot.
///
/// Implementations must answer from memory. `Ok(None)` means the protocol has
/// no row; `Err` means the status could not be read at all.
pub trait ProtocolStatusSource: Send + Sync {
    fn protocol_status(&self, protocol_id: &str) -> Result<Option<ProtocolStatus>>;
}

/// Why a launch was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    DriverUnavailable,
    ProtocolDisabled,
    PermissionDenied,
    ResourceForbidden,
}

impl DenyReason {
    /// Stable code for audit records and API responses.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::DriverUnavailable => "driver_unavailable",
            DenyReason::ProtocolDisabled => "protocol_disabled",
            DenyReason::PermissionDenied => "permission_denied",
            DenyReason::ResourceForbidden => "resource_forbidden",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub available: bool,
    pub reason: Option<DenyReason>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self {
            available: false,
            reason: Some(reason),
        }
    }
}

/// Running totals of decisions by outcome.
#[derive(Debug, Default)]
pub struct DecisionStats {
    allowed: AtomicU64,
    driver_unavailable: AtomicU64,
    protocol_disabled: AtomicU64,
    permission_denied: AtomicU64,
    resource_forbidden: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionStatsSnapshot {
    pub allowed: u64,
    pub driver_unavailable: u64,
    pub protocol_disabled: u64,
    pub permission_denied: u64,
    pub resource_forbidden: u64,
    pub errors: u64,
}

impl DecisionStatsSnapshot {
    pub fn denied(&self) -> u64 {
        self.driver_unavailable + self.protocol_disabled + self.permission_denied + self.resource_forbidden
    }
}

impl DecisionStats {
    fn record(&self, decision: &Decision) {
        let counter = match decision.reason {
            None => &self.allowed,
            Some(DenyReason::DriverUnavailable) => &self.driver_unavailable,
            Some(DenyReason::ProtocolDisabled) => &self.protocol_disabled,
            Some(DenyReason::PermissionDenied) => &self.permission_denied,
            Some(DenyReason::ResourceForbidden) => &self.resource_forbidden,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DecisionStatsSnapshot {
        DecisionStatsSnapshot {
            allowed: self.allowed.load(Ordering::Relaxed),
            driver_unavailable: self.driver_unavailable.load(Ordering::Relaxed),
            protocol_disabled: self.protocol_disabled.load(Ordering::Relaxed),
            permission_denied: self.permission_denied.load(Ordering::Relaxed),
            resource_forbidden: self.resource_forbidden.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Combines the resolver, the protocol snapshot and resource access control
/// into one launch decision.
pub struct DecisionEngine {
    resolver: Arc<Resolver>,
    access: Arc<ResourceAccessControl>,
    protocols: Arc<dyn ProtocolStatusSource>,
    stats: DecisionStats,
}

impl DecisionEngine {
    pub fn new(
        resolver: Arc<Resolver>,
        access: Arc<ResourceAccessControl>,
        protocols: Arc<dyn ProtocolStatusSource>,
    ) -> Self {
        Self {
            resolver,
            access,
            protocols,
            stats: DecisionStats::default(),
        }
    }

    pub async fn decide(
        &self,
        principal: &Principal,
        protocol_id: &str,
        resource: &ResourceRef,
    ) -> Result<Decision> {
        self.decide_at(principal, protocol_id, resource, Utc::now())
            .await
    }

    /// Decides with an explicit clock value for grant expiry.
    ///
    /// # Returns
    ///
    /// - `Ok(decision)` with `available == true` when every gate passes
    /// - `Ok(decision)` carrying the first failing gate's reason otherwise
    /// - `Err(AuthzError)` when a collaborator could not be consulted
    pub async fn decide_at(
        &self,
        principal: &Principal,
        protocol_id: &str,
        resource: &ResourceRef,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let result = self.evaluate(principal, protocol_id, resource, now).await;

        match &result {
            Ok(decision) => {
                self.stats.record(decision);
                match decision.reason {
                    None => debug!(
                        "Launch of {} on {} allowed for {}",
                        protocol_id, resource, principal.id
                    ),
                    Some(reason) => info!(
                        target: "audit",
                        principal = %principal.id,
                        protocol = %protocol_id,
                        resource = %resource,
                        reason = reason.code(),
                        "Launch rejected"
                    ),
                }
            }
            Err(e) => {
                self.stats.record_error();
                warn!(
                    "Launch decision for {} on {} failed: {}",
                    protocol_id, resource, e
                );
            }
        }

        result
    }

    /// Like [`decide`](Self::decide), failing with [`AuthzError::Timeout`]
    /// when no decision is reached within `timeout`.
    pub async fn decide_within(
        &self,
        timeout: Duration,
        principal: &Principal,
        protocol_id: &str,
        resource: &ResourceRef,
    ) -> Result<Decision> {
        match tokio::time::timeout(timeout, self.decide(principal, protocol_id, resource)).await {
            Ok(result) => result,
            Err(_) => {
                self.stats.record_error();
                warn!(
                    "Launch decision for {} on {} timed out after {:?}",
                    protocol_id, resource, timeout
                );
                Err(AuthzError::Timeout(timeout))
            }
        }
    }

    pub fn stats(&self) -> DecisionStatsSnapshot {
        self.stats.snapshot()
    }

    async fn evaluate(
        &self,
        principal: &Principal,
        protocol_id: &str,
        resource: &ResourceRef,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let status = match self.protocols.protocol_status(protocol_id)? {
            Some(status) if status.driver_enabled => status,
            _ => return Ok(Decision::deny(DenyReason::DriverUnavailable)),
        };

        if !status.config_enabled {
            return Ok(Decision::deny(DenyReason::ProtocolDisabled));
        }

        if !principal.is_root {
            let connect = connect_permission(protocol_id);
            if !self.resolver.check(principal, CONNECTION_VIEW)
                || !self.resolver.check(principal, &connect)
            {
                return Ok(Decision::deny(DenyReason::PermissionDenied));
            }
        }

        if !self
            .access
            .can_access_at(principal, resource, CONNECTION_VIEW, now)
            .await?
        {
            return Ok(Decision::deny(DenyReason::ResourceForbidden));
        }

        Ok(Decision::allow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::core_permissions;
    use crate::directory::ResourceDirectory;
    use crate::memory::{MemoryGrantStore, StaticDirectory};
    use crate::types::{PrincipalRef, ResourceOwnership, ShareRequest};
    use async_trait::async_trait;
    use permissions::{PermissionDefinition, PermissionRegistryBuilder, Role};
    use rstest::rstest;
    use std::collections::HashMap;

    struct FixedProtocols(HashMap<String, ProtocolStatus>);

    impl FixedProtocols {
        fn new(rows: &[(&str, bool, bool)]) -> Self {
            Self(
                rows.iter()
                    .map(|(id, driver_enabled, config_enabled)| {
                        (
                            id.to_string(),
                            ProtocolStatus {
                                driver_enabled: *driver_enabled,
                                config_enabled: *config_enabled,
                            },
                        )
                    })
                    .collect(),
            )
        }
    }

    impl ProtocolStatusSource for FixedProtocols {
        fn protocol_status(&self, protocol_id: &str) -> Result<Option<ProtocolStatus>> {
            Ok(self.0.get(protocol_id).copied())
        }
    }

    struct BrokenProtocols;

    impl ProtocolStatusSource for BrokenProtocols {
        fn protocol_status(&self, _protocol_id: &str) -> Result<Option<ProtocolStatus>> {
            Err(AuthzError::Catalog("snapshot unavailable".into()))
        }
    }

    struct SlowDirectory;

    #[async_trait]
    impl ResourceDirectory for SlowDirectory {
        async fn ownership(&self, _resource: &ResourceRef) -> Result<Option<ResourceOwnership>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
    }

    struct Fixture {
        resolver: Arc<Resolver>,
        access: Arc<ResourceAccessControl>,
        directory: Arc<StaticDirectory>,
    }

    async fn fixture() -> Fixture {
        let mut builder = PermissionRegistryBuilder::new();
        builder.register_all(core_permissions()).unwrap();
        for proto in ["ssh", "rdp", "vnc"] {
            builder
                .register(
                    PermissionDefinition::new(connect_permission(proto), proto, "Launch sessions")
                        .depends_on(CONNECTION_VIEW),
                )
                .unwrap();
        }
        let registry = Arc::new(builder.seal().unwrap());

        let resolver = Arc::new(Resolver::new(registry.clone()));
        resolver
            .upsert_role(
                Role::new("operator", "Operator")
                    .with_permission("ssh.connect")
                    .with_permission("rdp.connect")
                    .with_permission("vnc.connect"),
            )
            .unwrap();
        resolver
            .upsert_role(Role::new("viewer", "Viewer").with_permission(CONNECTION_VIEW))
            .unwrap();

        let directory = Arc::new(StaticDirectory::new());
        directory.add_user("u1").await;
        directory.add_user("u2").await;
        directory
            .set_owner(ResourceRef::connection("c1"), "u1", None)
            .await;

        let access = Arc::new(ResourceAccessControl::new(
            registry,
            Arc::new(MemoryGrantStore::new()),
            directory.clone(),
            directory.clone(),
        ));

        Fixture {
            resolver,
            access,
            directory,
        }
    }

    fn engine(f: &Fixture, protocols: Arc<dyn ProtocolStatusSource>) -> DecisionEngine {
        DecisionEngine::new(f.resolver.clone(), f.access.clone(), protocols)
    }

    fn standard_protocols() -> Arc<FixedProtocols> {
        Arc::new(FixedProtocols::new(&[
            ("ssh", true, true),
            ("rdp", false, true),
            ("vnc", true, false),
        ]))
    }

    fn c1() -> ResourceRef {
        ResourceRef::connection("c1")
    }

    #[rstest]
    #[case::healthy_and_enabled("ssh", None)]
    #[case::driver_down("rdp", Some(DenyReason::DriverUnavailable))]
    #[case::admin_disabled("vnc", Some(DenyReason::ProtocolDisabled))]
    #[case::no_catalog_row("telnet", Some(DenyReason::DriverUnavailable))]
    #[tokio::test]
    async fn test_root_still_evaluates_catalog_gates(
        #[case] protocol: &str,
        #[case] expected: Option<DenyReason>,
    ) {
        let f = fixture().await;
        let engine = engine(&f, standard_protocols());

        let decision = engine
            .decide(&Principal::root("admin"), protocol, &c1())
            .await
            .unwrap();
        assert_eq!(decision.reason, expected);
        assert_eq!(decision.available, expected.is_none());
    }

    #[tokio::test]
    async fn test_driver_gate_wins_over_config_gate() {
        let f = fixture().await;
        let engine = engine(&f, Arc::new(FixedProtocols::new(&[("ssh", false, false)])));

        let decision = engine
            .decide(&Principal::root("admin"), "ssh", &c1())
            .await
            .unwrap();
        assert_eq!(decision.reason, Some(DenyReason::DriverUnavailable));
    }

    #[tokio::test]
    async fn test_disabled_protocol_denied_despite_all_permissions() {
        let f = fixture().await;
        let engine = engine(&f, standard_protocols());
        let owner = Principal::user("u1").with_role("operator").with_role("viewer");

        let decision = engine.decide(&owner, "vnc", &c1()).await.unwrap();
        assert_eq!(decision, Decision::deny(DenyReason::ProtocolDisabled));
    }

    #[tokio::test]
    async fn test_permission_gate_requires_both_permissions() {
        let f = fixture().await;
        let engine = engine(&f, standard_protocols());

        // ssh.connect implies connection.view
        let operator = Principal::user("u1").with_role("operator");
        assert!(engine.decide(&operator, "ssh", &c1()).await.unwrap().available);

        let viewer = Principal::user("u1").with_role("viewer");
        assert_eq!(
            engine.decide(&viewer, "ssh", &c1()).await.unwrap().reason,
            Some(DenyReason::PermissionDenied)
        );

        let nobody = Principal::user("u1");
        assert_eq!(
            engine.decide(&nobody, "ssh", &c1()).await.unwrap().reason,
            Some(DenyReason::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_resource_gate() {
        let f = fixture().await;
        let engine = engine(&f, standard_protocols());
        let other = Principal::user("u2").with_role("operator");

        assert_eq!(
            engine.decide(&other, "ssh", &c1()).await.unwrap().reason,
            Some(DenyReason::ResourceForbidden)
        );

        f.access
            .share(ShareRequest::new(
                c1(),
                PrincipalRef::user("u2"),
                CONNECTION_VIEW,
                "u1",
            ))
            .await
            .unwrap();
        assert!(engine.decide(&other, "ssh", &c1()).await.unwrap().available);
    }

    #[tokio::test]
    async fn test_catalog_failure_is_an_error() {
        let f = fixture().await;
        let engine = engine(&f, Arc::new(BrokenProtocols));

        let err = engine
            .decide(&Principal::root("admin"), "ssh", &c1())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Catalog(_)));
        assert_eq!(engine.stats().errors, 1);
        assert_eq!(engine.stats().denied(), 0);
    }

    #[tokio::test]
    async fn test_decide_within_times_out() {
        let f = fixture().await;
        let access = Arc::new(ResourceAccessControl::new(
            f.resolver.registry().clone(),
            Arc::new(MemoryGrantStore::new()),
            f.directory.clone(),
            Arc::new(SlowDirectory),
        ));
        let engine = DecisionEngine::new(f.resolver.clone(), access, standard_protocols());
        let operator = Principal::user("u1").with_role("operator");

        let err = engine
            .decide_within(Duration::from_millis(100), &operator, "ssh", &c1())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Timeout(d) if d == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_stats_count_by_reason() {
        let f = fixture().await;
        let engine = engine(&f, standard_protocols());
        let operator = Principal::user("u1").with_role("operator");

        engine.decide(&operator, "ssh", &c1()).await.unwrap();
        engine.decide(&operator, "rdp", &c1()).await.unwrap();
        engine.decide(&operator, "vnc", &c1()).await.unwrap();
        engine.decide(&operator, "vnc", &c1()).await.unwrap();

        let stats = engine.stats();
        assert_eq!(stats.allowed, 1);
        assert_eq!(stats.driver_unavailable, 1);
        assert_eq!(stats.protocol_disabled, 2);
        assert_eq!(stats.denied(), 3);
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(DenyReason::DriverUnavailable.code(), "driver_unavailable");
        assert_eq!(DenyReason::ResourceForbidden.to_string(), "resource_forbidden");
        let json = serde_json::to_value(Decision::deny(DenyReason::ProtocolDisabled)).unwrap();
        assert_eq!(json["reason"], "protocol_disabled");
        assert_eq!(json["available"], false);
    }
}
