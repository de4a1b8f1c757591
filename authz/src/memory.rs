//! In-memory collaborators for tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use crate::directory::{GrantStore, MembershipProvider, ResourceDirectory};
use crate::error::Result;
use crate::types::{PrincipalRef, PrincipalType, ResourceOwnership, ResourcePermission, ResourceRef};

/// Users, teams, roles and resource owners held in memory.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: RwLock<HashSet<String>>,
    roles: RwLock<HashSet<String>>,
    /// team id -> member user ids
    teams: RwLock<HashMap<String, HashSet<String>>>,
    owners: RwLock<HashMap<ResourceRef, ResourceOwnership>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: &str) {
        self.users.write().await.insert(user_id.to_string());
    }

    pub async fn add_role(&self, role_id: &str) {
        self.roles.write().await.insert(role_id.to_string());
    }

    /// Creates the team if needed and adds the user to it.
    pub async fn add_member(&self, team_id: &str, user_id: &str) {
        self.users.write().await.insert(user_id.to_string());
        self.teams
            .write()
            .await
            .entry(team_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    pub async fn add_team(&self, team_id: &str) {
        self.teams
            .write()
            .await
            .entry(team_id.to_string())
            .or_default();
    }

    pub async fn set_owner(&self, resource: ResourceRef, owner_id: &str, team_id: Option<&str>) {
        self.owners.write().await.insert(
            resource,
            ResourceOwnership {
                owner_id: owner_id.to_string(),
                team_id: team_id.map(str::to_string),
            },
        );
    }
}

#[async_trait]
impl MembershipProvider for StaticDirectory {
    async fn teams_of(&self, user_id: &str) -> Result<Vec<String>> {
        let teams = self.teams.read().await;
        let mut result: Vec<String> = teams
            .iter()
            .filter(|(_, members)| members.contains(user_id))
            .map(|(team_id, _)| team_id.clone())
            .collect();
        result.sort();
        Ok(result)
    }

    async fn principal_exists(&self, principal: &PrincipalRef) -> Result<bool> {
        let exists = match principal.principal_type {
            PrincipalType::User => self.users.read().await.contains(&principal.id),
            PrincipalType::Team => self.teams.read().await.contains_key(&principal.id),
            PrincipalType::Role => self.roles.read().await.contains(&principal.id),
        };
        Ok(exists)
    }
}

#[async_trait]
impl ResourceDirectory for StaticDirectory {
    async fn ownership(&self, resource: &ResourceRef) -> Result<Option<ResourceOwnership>> {
        Ok(self.owners.read().await.get(resource).cloned())
    }
}

/// Grant rows held in memory, keyed by grant id.
#[derive(Debug, Default)]
pub struct MemoryGrantStore {
    grants: RwLock<BTreeMap<String, ResourcePermission>>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.grants.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.grants.read().await.is_empty()
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn insert(&self, grant: &ResourcePermission) -> Result<()> {
        self.grants
            .write()
            .await
            .insert(grant.id.clone(), grant.clone());
        Ok(())
    }

    async fn get(&self, grant_id: &str) -> Result<Option<ResourcePermission>> {
        Ok(self.grants.read().await.get(grant_id).cloned())
    }

    async fn find(
        &self,
        resource: &ResourceRef,
        principals: &[PrincipalRef],
    ) -> Result<Vec<ResourcePermission>> {
        let grants = self.grants.read().await;
        Ok(grants
            .values()
            .filter(|grant| &grant.resource == resource && principals.contains(&grant.principal))
            .cloned()
            .collect())
    }

    async fn list_for_resource(&self, resource: &ResourceRef) -> Result<Vec<ResourcePermission>> {
        let grants = self.grants.read().await;
        Ok(grants
            .values()
            .filter(|grant| &grant.resource == resource)
            .cloned()
            .collect())
    }

    async fn update_expiry(&self, grant_id: &str, expires_at: Option<DateTime<Utc>>) -> Result<bool> {
        let mut grants = self.grants.write().await;
        match grants.get_mut(grant_id) {
            Some(grant) => {
                grant.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, grant_id: &str) -> Result<bool> {
        Ok(self.grants.write().await.remove(grant_id).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut grants = self.grants.write().await;
        let before = grants.len();
        grants.retain(|_, grant| grant.is_active_at(now));
        Ok(before - grants.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_memberships() {
        let directory = StaticDirectory::new();
        directory.add_member("T2", "u1").await;
        directory.add_member("T1", "u1").await;
        directory.add_member("T1", "u2").await;
        directory.add_role("viewer").await;

        assert_eq!(directory.teams_of("u1").await.unwrap(), vec!["T1", "T2"]);
        assert!(directory.teams_of("nobody").await.unwrap().is_empty());

        assert!(directory.principal_exists(&PrincipalRef::user("u2")).await.unwrap());
        assert!(directory.principal_exists(&PrincipalRef::team("T1")).await.unwrap());
        assert!(directory.principal_exists(&PrincipalRef::role("viewer")).await.unwrap());
        assert!(!directory.principal_exists(&PrincipalRef::team("T3")).await.unwrap());
        // Identifiers are scoped by principal type
        assert!(!directory.principal_exists(&PrincipalRef::user("T1")).await.unwrap());
    }
}
