//! In-memory collaborators for engine tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use super::{DurableCache, EngineConfig, EngineError, GrantSource, PermissionEngine, SharedCache};
use crate::kind::{PermissionKind, ScopedApplicationPermissionKind};
use crate::model::{
    ApplicationGrant, ApplicationId, ApplicationPermissionCache, ApplicationScope, GlobalGrant,
    GlobalPermissionCache, Group, GroupId, GroupMembership, UserId,
};

#[derive(Default)]
struct Directory {
    users: HashSet<UserId>,
    groups: HashMap<GroupId, Group>,
    memberships: Vec<GroupMembership>,
    global: Vec<GlobalGrant>,
    application: Vec<ApplicationGrant>,
    applications: Vec<ApplicationId>,
}

#[derive(Default)]
pub(crate) struct FakeSource {
    directory: Mutex<Directory>,
    fail_application_grants: AtomicBool,
    failing_user: Mutex<Option<UserId>>,
    read_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    removed: Mutex<Vec<(GroupId, UserId)>>,
}

impl FakeSource {
    pub(crate) fn add_user(&self) -> UserId {
        let id = UserId::new(Uuid::new_v4());
        self.directory.lock().unwrap().users.insert(id);
        id
    }

    pub(crate) fn remove_user(&self, user_id: &UserId) {
        self.directory.lock().unwrap().users.remove(user_id);
    }

    pub(crate) fn add_group(&self, priority: u32) -> GroupId {
        let id = GroupId::new(Uuid::new_v4());
        self.directory
            .lock()
            .unwrap()
            .groups
            .insert(id, Group::new(id, format!("group-{priority}"), priority));
        id
    }

    /// Drops the group record and its grants; memberships stay behind.
    pub(crate) fn delete_group(&self, group_id: &GroupId) {
        let mut dir = self.directory.lock().unwrap();
        dir.groups.remove(group_id);
        dir.global.retain(|g| g.group_id != *group_id);
        dir.application.retain(|g| g.group_id != *group_id);
    }

    pub(crate) fn add_application(&self) -> ApplicationId {
        let id = ApplicationId::new(Uuid::new_v4());
        self.directory.lock().unwrap().applications.push(id);
        id
    }

    pub(crate) fn join(&self, group_id: GroupId, user_id: UserId) {
        self.directory
            .lock()
            .unwrap()
            .memberships
            .push(GroupMembership::new(group_id, user_id));
    }

    pub(crate) fn grant_global(&self, group_id: GroupId, kind: PermissionKind, allow: bool) {
        self.directory.lock().unwrap().global.push(GlobalGrant {
            group_id,
            kind,
            allow,
        });
    }

    pub(crate) fn revoke_global(&self, group_id: GroupId, kind: PermissionKind) {
        self.directory
            .lock()
            .unwrap()
            .global
            .retain(|g| !(g.group_id == group_id && g.kind == kind));
    }

    pub(crate) fn grant_application(
        &self,
        group_id: GroupId,
        scope: ApplicationScope,
        kind: ScopedApplicationPermissionKind,
        allow: bool,
    ) {
        self.directory
            .lock()
            .unwrap()
            .application
            .push(ApplicationGrant::new(group_id, scope, kind, allow));
    }

    pub(crate) fn fail_application_grants(&self, fail: bool) {
        self.fail_application_grants.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_user(&self, user_id: UserId) {
        *self.failing_user.lock().unwrap() = Some(user_id);
    }

    pub(crate) fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    /// Highest number of recomputations observed between their first and last read.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn removed(&self) -> Vec<(GroupId, UserId)> {
        self.removed.lock().unwrap().clone()
    }

    pub(crate) fn active_memberships(&self, group_id: &GroupId) -> usize {
        self.directory
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|m| m.group_id == *group_id && !m.deleted)
            .count()
    }
}

impl GrantSource for FakeSource {
    async fn memberships_for_user(&self, user_id: &UserId) -> Result<Vec<GroupMembership>, EngineError> {
        if *self.failing_user.lock().unwrap() == Some(*user_id) {
            return Err(EngineError::Storage(format!("memberships unavailable for {user_id}")));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self
            .directory
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|m| m.user_id == *user_id && !m.deleted)
            .cloned()
            .collect())
    }

    async fn memberships_for_group(&self, group_id: &GroupId) -> Result<Vec<GroupMembership>, EngineError> {
        Ok(self
            .directory
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|m| m.group_id == *group_id && !m.deleted)
            .cloned()
            .collect())
    }

    async fn groups_by_id(&self, ids: &[GroupId]) -> Result<Vec<Group>, EngineError> {
        let dir = self.directory.lock().unwrap();
        Ok(ids.iter().filter_map(|id| dir.groups.get(id).cloned()).collect())
    }

    async fn global_grants(&self, group_id: &GroupId) -> Result<Vec<GlobalGrant>, EngineError> {
        Ok(self
            .directory
            .lock()
            .unwrap()
            .global
            .iter()
            .filter(|g| g.group_id == *group_id)
            .copied()
            .collect())
    }

    async fn application_grants(&self, group_id: &GroupId) -> Result<Vec<ApplicationGrant>, EngineError> {
        if self.fail_application_grants.load(Ordering::SeqCst) {
            return Err(EngineError::Storage("application grants unavailable".to_string()));
        }

        Ok(self
            .directory
            .lock()
            .unwrap()
            .application
            .iter()
            .filter(|g| g.group_id == *group_id)
            .copied()
            .collect())
    }

    async fn application_ids(&self) -> Result<Vec<ApplicationId>, EngineError> {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.directory.lock().unwrap().applications.clone())
    }

    async fn user_exists(&self, user_id: &UserId) -> Result<bool, EngineError> {
        Ok(self.directory.lock().unwrap().users.contains(user_id))
    }

    async fn remove_membership(&self, group_id: &GroupId, user_id: &UserId) -> Result<(), EngineError> {
        let mut dir = self.directory.lock().unwrap();
        for m in dir
            .memberships
            .iter_mut()
            .filter(|m| m.group_id == *group_id && m.user_id == *user_id)
        {
            m.deleted = true;
        }
        self.removed.lock().unwrap().push((*group_id, *user_id));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeDurable {
    global: Mutex<HashMap<UserId, GlobalPermissionCache>>,
    application: Mutex<BTreeMap<(UserId, ApplicationId), ApplicationPermissionCache>>,
    writes: AtomicUsize,
}

impl FakeDurable {
    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn application_records(&self, user_id: &UserId) -> usize {
        self.application
            .lock()
            .unwrap()
            .keys()
            .filter(|(u, _)| u == user_id)
            .count()
    }
}

impl DurableCache for FakeDurable {
    async fn replace_global(&self, record: &GlobalPermissionCache) -> Result<(), EngineError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.global
            .lock()
            .unwrap()
            .insert(record.user_id, record.clone());
        Ok(())
    }

    async fn replace_application(&self, record: &ApplicationPermissionCache) -> Result<(), EngineError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.application
            .lock()
            .unwrap()
            .insert((record.user_id, record.application_id), record.clone());
        Ok(())
    }

    async fn global(&self, user_id: &UserId) -> Result<Option<GlobalPermissionCache>, EngineError> {
        Ok(self.global.lock().unwrap().get(user_id).cloned())
    }

    async fn application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationPermissionCache>, EngineError> {
        Ok(self
            .application
            .lock()
            .unwrap()
            .get(&(*user_id, *application_id))
            .cloned())
    }
}

#[derive(Default)]
pub(crate) struct FakeShared {
    entries: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
}

impl FakeShared {
    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub(crate) fn put_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl SharedCache for FakeShared {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), EngineError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

pub(crate) struct Fixture {
    pub(crate) source: Arc<FakeSource>,
    pub(crate) durable: Arc<FakeDurable>,
    pub(crate) shared: Arc<FakeShared>,
    pub(crate) engine: PermissionEngine<FakeSource, FakeDurable, FakeShared>,
}

pub(crate) fn fixture() -> Fixture {
    fixture_with(EngineConfig::default())
}

pub(crate) fn fixture_with(config: EngineConfig) -> Fixture {
    let source = Arc::new(FakeSource::default());
    let durable = Arc::new(FakeDurable::default());
    let shared = Arc::new(FakeShared::default());
    let engine = PermissionEngine::new(
        Arc::clone(&source),
        Arc::clone(&durable),
        Arc::clone(&shared),
        config,
    );

    Fixture {
        source,
        durable,
        shared,
        engine,
    }
}
