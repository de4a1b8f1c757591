//! Collaborator contracts for identity and ownership lookups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{PrincipalRef, ResourceOwnership, ResourcePermission, ResourceRef};

/// Supplies team memberships and validates principal references.
///
/// Lookup failures must be reported as [`AuthzError::Membership`](crate::AuthzError::Membership).
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    /// Teams the user belongs to.
    async fn teams_of(&self, user_id: &str) -> Result<Vec<String>>;

    /// Whether the principal reference names an existing user, team or role.
    async fn principal_exists(&self, principal: &PrincipalRef) -> Result<bool>;
}

/// Resolves the owner of a resource instance.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// `None` when the resource is unknown to the directory.
    async fn ownership(&self, resource: &ResourceRef) -> Result<Option<ResourceOwnership>>;
}

/// Storage for explicit grants.
///
/// Reads return expired rows too; expiry is evaluated by the caller so the
/// read path never deletes anything.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn insert(&self, grant: &ResourcePermission) -> Result<()>;

    async fn get(&self, grant_id: &str) -> Result<Option<ResourcePermission>>;

    /// Grants on `resource` naming any of `principals`.
    async fn find(
        &self,
        resource: &ResourceRef,
        principals: &[PrincipalRef],
    ) -> Result<Vec<ResourcePermission>>;

    async fn list_for_resource(&self, resource: &ResourceRef) -> Result<Vec<ResourcePermission>>;

    /// Returns whether a grant was updated.
    async fn update_expiry(&self, grant_id: &str, expires_at: Option<DateTime<Utc>>) -> Result<bool>;

    /// Returns whether a grant was removed.
    async fn delete(&self, grant_id: &str) -> Result<bool>;

    /// Deletes grants that expired at or before `now`, returning the count.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}
