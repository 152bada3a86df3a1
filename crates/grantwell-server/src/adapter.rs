use std::sync::Arc;

use grantwell_core::engine::{DurableCache, EngineError, GrantSource, SharedCache};
use grantwell_core::model::{
    ApplicationGrant, ApplicationId, ApplicationPermissionCache, GlobalGrant,
    GlobalPermissionCache, Group, GroupId, GroupMembership, UserId,
};
use grantwell_storage::{DirectoryStore, PermissionCacheStore, SharedCacheStore, StorageError};

use crate::metrics::Metrics;

fn storage_error(e: StorageError) -> EngineError {
    EngineError::Storage(e.to_string())
}

fn cache_error(e: StorageError) -> EngineError {
    EngineError::Cache(e.to_string())
}

pub struct StoreGrantSource<D: DirectoryStore> {
    store: Arc<D>,
}

impl<D: DirectoryStore> StoreGrantSource<D> {
    pub fn new(store: Arc<D>) -> Self {
        Self { store }
    }
}

impl<D: DirectoryStore> GrantSource for StoreGrantSource<D> {
    async fn memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<GroupMembership>, EngineError> {
        self.store
            .memberships_for_user(user_id)
            .await
            .map_err(storage_error)
    }

    async fn memberships_for_group(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<GroupMembership>, EngineError> {
        self.store
            .memberships_for_group(group_id)
            .await
            .map_err(storage_error)
    }

    async fn groups_by_id(&self, ids: &[GroupId]) -> Result<Vec<Group>, EngineError> {
        self.store.get_groups(ids).await.map_err(storage_error)
    }

    async fn global_grants(&self, group_id: &GroupId) -> Result<Vec<GlobalGrant>, EngineError> {
        self.store.global_grants(group_id).await.map_err(storage_error)
    }

    async fn application_grants(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<ApplicationGrant>, EngineError> {
        self.store
            .application_grants(group_id)
            .await
            .map_err(storage_error)
    }

    async fn application_ids(&self) -> Result<Vec<ApplicationId>, EngineError> {
        self.store.application_ids().await.map_err(storage_error)
    }

    async fn user_exists(&self, user_id: &UserId) -> Result<bool, EngineError> {
        self.store.user_exists(user_id).await.map_err(storage_error)
    }

    async fn remove_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), EngineError> {
        self.store
            .remove_membership(group_id, user_id)
            .await
            .map_err(storage_error)
    }
}

pub struct StoreDurableCache<C: PermissionCacheStore> {
    store: Arc<C>,
}

impl<C: PermissionCacheStore> StoreDurableCache<C> {
    pub fn new(store: Arc<C>) -> Self {
        Self { store }
    }
}

impl<C: PermissionCacheStore> DurableCache for StoreDurableCache<C> {
    async fn replace_global(&self, record: &GlobalPermissionCache) -> Result<(), EngineError> {
        self.store.upsert_global(record).await.map_err(storage_error)
    }

    async fn replace_application(
        &self,
        record: &ApplicationPermissionCache,
    ) -> Result<(), EngineError> {
        self.store
            .upsert_application(record)
            .await
            .map_err(storage_error)
    }

    async fn global(&self, user_id: &UserId) -> Result<Option<GlobalPermissionCache>, EngineError> {
        self.store.latest_global(user_id).await.map_err(storage_error)
    }

    async fn application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationPermissionCache>, EngineError> {
        self.store
            .latest_application(user_id, application_id)
            .await
            .map_err(storage_error)
    }
}

/// Shared tier adapter that counts hits and misses.
pub struct StoreSharedCache<S: SharedCacheStore> {
    store: Arc<S>,
    metrics: Arc<Metrics>,
}

impl<S: SharedCacheStore> StoreSharedCache<S> {
    pub fn new(store: Arc<S>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }
}

impl<S: SharedCacheStore> SharedCache for StoreSharedCache<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        let value = self.store.get(key).await.map_err(cache_error)?;
        match value {
            Some(_) => self.metrics.record_shared_cache_hit(),
            None => self.metrics.record_shared_cache_miss(),
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), EngineError> {
        self.store.set(key, value).await.map_err(cache_error)
    }
}
