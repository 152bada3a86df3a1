use grantwell_core::model::{
    ApplicationGrant, ApplicationId, ApplicationPermissionCache, GlobalGrant,
    GlobalPermissionCache, Group, GroupId, GroupMembership, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Groups, memberships, grants, applications and users.
pub trait DirectoryStore: Send + Sync {
    fn get_group(
        &self,
        id: &GroupId,
    ) -> impl Future<Output = Result<Option<Group>, StorageError>> + Send;

    /// Unknown ids are left out of the result.
    fn get_groups(
        &self,
        ids: &[GroupId],
    ) -> impl Future<Output = Result<Vec<Group>, StorageError>> + Send;

    fn list_groups(&self) -> impl Future<Output = Result<Vec<Group>, StorageError>> + Send;

    fn memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Vec<GroupMembership>, StorageError>> + Send;

    fn memberships_for_group(
        &self,
        group_id: &GroupId,
    ) -> impl Future<Output = Result<Vec<GroupMembership>, StorageError>> + Send;

    fn global_grants(
        &self,
        group_id: &GroupId,
    ) -> impl Future<Output = Result<Vec<GlobalGrant>, StorageError>> + Send;

    fn application_grants(
        &self,
        group_id: &GroupId,
    ) -> impl Future<Output = Result<Vec<ApplicationGrant>, StorageError>> + Send;

    fn application_ids(
        &self,
    ) -> impl Future<Output = Result<Vec<ApplicationId>, StorageError>> + Send;

    fn user_exists(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Soft-deletes the membership. `NotFound` if it was never recorded.
    fn remove_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Durable per-user permission caches.
pub trait PermissionCacheStore: Send + Sync {
    /// Insert or replace; an existing record keeps its `created_at`.
    fn upsert_global(
        &self,
        record: &GlobalPermissionCache,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn upsert_application(
        &self,
        record: &ApplicationPermissionCache,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn latest_global(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<GlobalPermissionCache>, StorageError>> + Send;

    fn latest_application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> impl Future<Output = Result<Option<ApplicationPermissionCache>, StorageError>> + Send;
}

/// String key/value tier shared across processes.
pub trait SharedCacheStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), StorageError>> + Send;
}
