pub mod migrations;
mod queries;

use sqlx::PgPool;

use grantwell_core::kind::{PermissionKind, ScopedApplicationPermissionKind};
use grantwell_core::model::{
    ApplicationGrant, ApplicationId, ApplicationPermissionCache, ApplicationScope, GlobalGrant,
    GlobalPermissionCache, Group, GroupId, GroupMembership, UserId,
};

use crate::traits::{DirectoryStore, PermissionCacheStore, StorageError};

#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_group(&self, group: &Group) -> Result<(), StorageError> {
        queries::upsert_group(&self.pool, group).await
    }

    /// Grants go with the group (cascade); memberships are kept.
    pub async fn delete_group(&self, group_id: &GroupId) -> Result<(), StorageError> {
        if !queries::delete_group(&self.pool, group_id).await? {
            return Err(StorageError::NotFound(format!("group {group_id}")));
        }
        Ok(())
    }

    pub async fn add_user(&self, user_id: &UserId) -> Result<(), StorageError> {
        queries::insert_user(&self.pool, user_id).await
    }

    pub async fn remove_user(&self, user_id: &UserId) -> Result<(), StorageError> {
        queries::delete_user(&self.pool, user_id).await
    }

    pub async fn register_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<(), StorageError> {
        queries::insert_application(&self.pool, application_id).await
    }

    pub async fn add_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), StorageError> {
        queries::insert_membership(&self.pool, group_id, user_id).await
    }

    pub async fn set_global_grant(&self, grant: &GlobalGrant) -> Result<(), StorageError> {
        queries::upsert_global_grant(&self.pool, grant).await
    }

    pub async fn revoke_global_grant(
        &self,
        group_id: &GroupId,
        kind: PermissionKind,
    ) -> Result<(), StorageError> {
        queries::delete_global_grant(&self.pool, group_id, kind).await
    }

    pub async fn set_application_grant(&self, grant: &ApplicationGrant) -> Result<(), StorageError> {
        queries::upsert_application_grant(&self.pool, grant).await
    }

    pub async fn revoke_application_grant(
        &self,
        group_id: &GroupId,
        scope: ApplicationScope,
        kind: ScopedApplicationPermissionKind,
    ) -> Result<(), StorageError> {
        queries::delete_application_grant(&self.pool, group_id, scope, kind).await
    }
}

impl DirectoryStore for PostgresDirectory {
    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StorageError> {
        queries::get_group(&self.pool, id).await
    }

    async fn get_groups(&self, ids: &[GroupId]) -> Result<Vec<Group>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        queries::get_groups(&self.pool, ids).await
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
        queries::list_groups(&self.pool).await
    }

    async fn memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<GroupMembership>, StorageError> {
        queries::memberships_for_user(&self.pool, user_id).await
    }

    async fn memberships_for_group(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<GroupMembership>, StorageError> {
        queries::memberships_for_group(&self.pool, group_id).await
    }

    async fn global_grants(&self, group_id: &GroupId) -> Result<Vec<GlobalGrant>, StorageError> {
        queries::global_grants(&self.pool, group_id).await
    }

    async fn application_grants(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<ApplicationGrant>, StorageError> {
        queries::application_grants(&self.pool, group_id).await
    }

    async fn application_ids(&self) -> Result<Vec<ApplicationId>, StorageError> {
        queries::application_ids(&self.pool).await
    }

    async fn user_exists(&self, user_id: &UserId) -> Result<bool, StorageError> {
        queries::user_exists(&self.pool, user_id).await
    }

    async fn remove_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), StorageError> {
        if !queries::soft_delete_membership(&self.pool, group_id, user_id).await? {
            return Err(StorageError::NotFound(format!(
                "membership of {user_id} in group {group_id}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresCacheStore {
    pool: PgPool,
}

impl PostgresCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PermissionCacheStore for PostgresCacheStore {
    async fn upsert_global(&self, record: &GlobalPermissionCache) -> Result<(), StorageError> {
        queries::upsert_global_cache(&self.pool, record).await
    }

    async fn upsert_application(
        &self,
        record: &ApplicationPermissionCache,
    ) -> Result<(), StorageError> {
        queries::upsert_application_cache(&self.pool, record).await
    }

    async fn latest_global(
        &self,
        user_id: &UserId,
    ) -> Result<Option<GlobalPermissionCache>, StorageError> {
        queries::latest_global_cache(&self.pool, user_id).await
    }

    async fn latest_application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationPermissionCache>, StorageError> {
        queries::latest_application_cache(&self.pool, user_id, application_id).await
    }
}
