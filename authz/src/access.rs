//! Resource-level access control: ownership plus explicit, expiring grants.

use chrono::{DateTime, Utc};
use permissions::{PermissionRegistry, Principal};
use std::sync::Arc;
use tracing::{debug, info};

use crate::directory::{GrantStore, MembershipProvider, ResourceDirectory};
use crate::error::{AuthzError, Result};
use crate::types::{PrincipalRef, ResourcePermission, ResourceRef, ShareRequest};

/// How an access check was satisfied. Useful for audit records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessBasis {
    Root,
    Owner,
    TeamOwner(String),
    Grant(String),
}

/// Decides whether a principal may act on a specific resource instance.
///
/// # Evaluation Order
///
/// 1. Root principals are allowed before any lookup
/// 2. Direct ownership
/// 3. Team ownership, using the caller's memberships
/// 4. An active grant naming the caller, one of its teams or one of its roles,
///    whose permission is the required one or implies it
///
/// The first match wins. Collaborator failures are returned as errors.
pub struct ResourceAccessControl {
    registry: Arc<PermissionRegistry>,
    grants: Arc<dyn GrantStore>,
    membership: Arc<dyn MembershipProvider>,
    directory: Arc<dyn ResourceDirectory>,
}

impl ResourceAccessControl {
    pub fn new(
        registry: Arc<PermissionRegistry>,
        grants: Arc<dyn GrantStore>,
        membership: Arc<dyn MembershipProvider>,
        directory: Arc<dyn ResourceDirectory>,
    ) -> Self {
        Self {
            registry,
            grants,
            membership,
            directory,
        }
    }

    pub async fn can_access(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        required: &str,
    ) -> Result<bool> {
        self.can_access_at(principal, resource, required, Utc::now())
            .await
    }

    /// Same as [`can_access`](Self::can_access) with an explicit clock value.
    pub async fn can_access_at(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        required: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self
            .access_basis_at(principal, resource, required, now)
            .await?
            .is_some())
    }

    /// Returns how access is granted, or `None` when it is not.
    pub async fn access_basis_at(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        required: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessBasis>> {
        if principal.is_root {
            return Ok(Some(AccessBasis::Root));
        }

        let ownership = self.directory.ownership(resource).await?;
        if let Some(ownership) = &ownership {
            if ownership.owner_id == principal.id {
                debug!("{} owns {}", principal.id, resource);
                return Ok(Some(AccessBasis::Owner));
            }
        }

        let teams = self.membership.teams_of(&principal.id).await?;
        if let Some(team_id) = ownership.as_ref().and_then(|o| o.team_id.as_ref()) {
            if teams.contains(team_id) {
                debug!("{} reaches {} through team {}", principal.id, resource, team_id);
                return Ok(Some(AccessBasis::TeamOwner(team_id.clone())));
            }
        }

        let mut candidates = Vec::with_capacity(1 + teams.len() + principal.roles.len());
        candidates.push(PrincipalRef::user(&principal.id));
        candidates.extend(teams.into_iter().map(PrincipalRef::team));
        candidates.extend(principal.roles.iter().map(PrincipalRef::role));

        let grants = self.grants.find(resource, &candidates).await?;
        let matched = grants.into_iter().find(|grant| {
            grant.is_active_at(now) && self.registry.implies(&grant.permission_id, required)
        });

        Ok(matched.map(|grant| {
            debug!(
                "{} reaches {} through grant {} ({})",
                principal.id, resource, grant.id, grant.principal
            );
            AccessBasis::Grant(grant.id)
        }))
    }

    pub async fn share(&self, request: ShareRequest) -> Result<ResourcePermission> {
        self.share_at(request, Utc::now()).await
    }

    /// Creates an explicit grant.
    ///
    /// Grants made by root principals are recorded exactly like any other,
    /// with `granted_by` set to the granting principal.
    pub async fn share_at(&self, request: ShareRequest, now: DateTime<Utc>) -> Result<ResourcePermission> {
        if !self.registry.contains(&request.permission_id) {
            return Err(AuthzError::UnknownPermission(request.permission_id));
        }

        if matches!(request.expires_at, Some(expires_at) if expires_at <= now) {
            return Err(AuthzError::InvalidExpiry);
        }

        if !self.membership.principal_exists(&request.grantee).await? {
            return Err(AuthzError::InvalidPrincipal {
                principal_type: request.grantee.principal_type.to_string(),
                id: request.grantee.id,
            });
        }

        let existing = self
            .grants
            .find(&request.resource, std::slice::from_ref(&request.grantee))
            .await?;
        if let Some(duplicate) = existing
            .iter()
            .find(|grant| grant.permission_id == request.permission_id && grant.is_active_at(now))
        {
            return Err(AuthzError::AlreadyGranted(duplicate.id.clone()));
        }

        let grant = ResourcePermission {
            id: ulid::Ulid::new().to_string(),
            resource: request.resource,
            principal: request.grantee,
            permission_id: request.permission_id,
            granted_by: request.granted_by,
            expires_at: request.expires_at,
            metadata: request.metadata,
            created_at: now,
        };
        self.grants.insert(&grant).await?;

        info!(
            target: "audit",
            grant = %grant.id,
            resource = %grant.resource,
            principal = %grant.principal,
            permission = %grant.permission_id,
            granted_by = %grant.granted_by,
            "Resource shared"
        );
        Ok(grant)
    }

    /// Removes a grant. Revoking a missing or already expired grant succeeds.
    pub async fn revoke(&self, grant_id: &str) -> Result<()> {
        if self.grants.delete(grant_id).await? {
            info!(target: "audit", grant = %grant_id, "Grant revoked");
        } else {
            debug!("Grant {} already gone, nothing to revoke", grant_id);
        }
        Ok(())
    }

    /// Moves the expiry of an existing grant. `None` makes it permanent.
    pub async fn update_expiry(
        &self,
        grant_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ResourcePermission> {
        if !self.grants.update_expiry(grant_id, expires_at).await? {
            return Err(AuthzError::GrantNotFound(grant_id.to_string()));
        }

        let grant = self
            .grants
            .get(grant_id)
            .await?
            .ok_or_else(|| AuthzError::GrantNotFound(grant_id.to_string()))?;
        info!(target: "audit", grant = %grant_id, expires_at = ?expires_at, "Grant expiry updated");
        Ok(grant)
    }

    /// Active grants on a resource.
    pub async fn grants_for(&self, resource: &ResourceRef) -> Result<Vec<ResourcePermission>> {
        let now = Utc::now();
        let mut grants = self.grants.list_for_resource(resource).await?;
        grants.retain(|grant| grant.is_active_at(now));
        Ok(grants)
    }

    /// Housekeeping: deletes grants that expired at or before `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let purged = self.grants.purge_expired(now).await?;
        if purged > 0 {
            info!("Purged {} expired grants", purged);
        }
        Ok(purged)
    }
}
