use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use grantwell_core::kind::{PermissionKind, ScopedApplicationPermissionKind};
use grantwell_core::model::{
    ApplicationGrant, ApplicationId, ApplicationPermissionCache, ApplicationScope, GlobalGrant,
    GlobalPermissionCache, Group, GroupId, GroupMembership, UserId,
};

use crate::traits::{DirectoryStore, PermissionCacheStore, StorageError};

#[derive(Debug, Default)]
struct DirectoryState {
    groups: BTreeMap<GroupId, Group>,
    users: HashSet<UserId>,
    applications: Vec<ApplicationId>,
    memberships: Vec<GroupMembership>,
    global: Vec<GlobalGrant>,
    application: Vec<ApplicationGrant>,
}

/// Directory held in process memory. Grants are returned in the order they
/// were first set.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_group(&self, group: Group) {
        self.state.lock().unwrap().groups.insert(group.id, group);
    }

    /// Removes the group record and its grants. Memberships are left in place
    /// so a group recalculation can still reach former members.
    pub fn delete_group(&self, group_id: &GroupId) {
        let mut state = self.state.lock().unwrap();
        state.groups.remove(group_id);
        state.global.retain(|g| g.group_id != *group_id);
        state.application.retain(|g| g.group_id != *group_id);
    }

    pub fn add_user(&self, user_id: UserId) {
        self.state.lock().unwrap().users.insert(user_id);
    }

    pub fn remove_user(&self, user_id: &UserId) {
        self.state.lock().unwrap().users.remove(user_id);
    }

    pub fn register_application(&self, application_id: ApplicationId) {
        let mut state = self.state.lock().unwrap();
        if !state.applications.contains(&application_id) {
            state.applications.push(application_id);
        }
    }

    /// Adds the membership, reviving it if it was removed.
    pub fn add_membership(&self, group_id: GroupId, user_id: UserId) {
        let mut state = self.state.lock().unwrap();
        match state
            .memberships
            .iter_mut()
            .find(|m| m.group_id == group_id && m.user_id == user_id)
        {
            Some(existing) => existing.deleted = false,
            None => state
                .memberships
                .push(GroupMembership::new(group_id, user_id)),
        }
    }

    pub fn set_global_grant(&self, grant: GlobalGrant) {
        let mut state = self.state.lock().unwrap();
        match state
            .global
            .iter_mut()
            .find(|g| g.group_id == grant.group_id && g.kind == grant.kind)
        {
            Some(existing) => existing.allow = grant.allow,
            None => state.global.push(grant),
        }
    }

    pub fn revoke_global_grant(&self, group_id: &GroupId, kind: PermissionKind) {
        self.state
            .lock()
            .unwrap()
            .global
            .retain(|g| !(g.group_id == *group_id && g.kind == kind));
    }

    pub fn set_application_grant(&self, grant: ApplicationGrant) {
        let mut state = self.state.lock().unwrap();
        match state.application.iter_mut().find(|g| {
            g.group_id == grant.group_id && g.scope == grant.scope && g.kind == grant.kind
        }) {
            Some(existing) => existing.allow = grant.allow,
            None => state.application.push(grant),
        }
    }

    pub fn revoke_application_grant(
        &self,
        group_id: &GroupId,
        scope: ApplicationScope,
        kind: ScopedApplicationPermissionKind,
    ) {
        self.state
            .lock()
            .unwrap()
            .application
            .retain(|g| !(g.group_id == *group_id && g.scope == scope && g.kind == kind));
    }
}

impl DirectoryStore for InMemoryDirectory {
    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StorageError> {
        Ok(self.state.lock().unwrap().groups.get(id).cloned())
    }

    async fn get_groups(&self, ids: &[GroupId]) -> Result<Vec<Group>, StorageError> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.groups.get(id).cloned())
            .collect())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
        Ok(self.state.lock().unwrap().groups.values().cloned().collect())
    }

    async fn memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<GroupMembership>, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|m| m.user_id == *user_id && !m.deleted)
            .cloned()
            .collect())
    }

    async fn memberships_for_group(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<GroupMembership>, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|m| m.group_id == *group_id && !m.deleted)
            .cloned()
            .collect())
    }

    async fn global_grants(&self, group_id: &GroupId) -> Result<Vec<GlobalGrant>, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .global
            .iter()
            .filter(|g| g.group_id == *group_id)
            .copied()
            .collect())
    }

    async fn application_grants(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<ApplicationGrant>, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .application
            .iter()
            .filter(|g| g.group_id == *group_id)
            .copied()
            .collect())
    }

    async fn application_ids(&self) -> Result<Vec<ApplicationId>, StorageError> {
        Ok(self.state.lock().unwrap().applications.clone())
    }

    async fn user_exists(&self, user_id: &UserId) -> Result<bool, StorageError> {
        Ok(self.state.lock().unwrap().users.contains(user_id))
    }

    async fn remove_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        let membership = state
            .memberships
            .iter_mut()
            .find(|m| m.group_id == *group_id && m.user_id == *user_id)
            .ok_or_else(|| {
                StorageError::NotFound(format!("membership of {user_id} in group {group_id}"))
            })?;
        membership.deleted = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CacheState {
    global: HashMap<UserId, GlobalPermissionCache>,
    application: HashMap<(UserId, ApplicationId), ApplicationPermissionCache>,
}

/// Durable cache tier held in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCacheStore {
    state: Arc<Mutex<CacheState>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionCacheStore for InMemoryCacheStore {
    async fn upsert_global(&self, record: &GlobalPermissionCache) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        let mut record = record.clone();
        if let Some(existing) = state.global.get(&record.user_id) {
            record.created_at = existing.created_at;
        }
        state.global.insert(record.user_id, record);
        Ok(())
    }

    async fn upsert_application(
        &self,
        record: &ApplicationPermissionCache,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        let key = (record.user_id, record.application_id);
        let mut record = record.clone();
        if let Some(existing) = state.application.get(&key) {
            record.created_at = existing.created_at;
        }
        state.application.insert(key, record);
        Ok(())
    }

    async fn latest_global(
        &self,
        user_id: &UserId,
    ) -> Result<Option<GlobalPermissionCache>, StorageError> {
        Ok(self.state.lock().unwrap().global.get(user_id).cloned())
    }

    async fn latest_application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationPermissionCache>, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .application
            .get(&(*user_id, *application_id))
            .cloned())
    }
}
