mod locks;
pub mod merge;
mod query;
mod resolve;

#[cfg(test)]
mod testing;

pub use query::CheckMode;
pub use resolve::{GroupRecalculation, PermissionEngine};

use std::collections::BTreeSet;
use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::inheritance::{DEFAULT_MAX_DEPTH, InheritanceError};
use crate::model::{
    ApplicationGrant, ApplicationId, ApplicationPermissionCache, GlobalGrant,
    GlobalPermissionCache, Group, GroupId, GroupMembership, UserId,
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("inheritance error: {0}")]
    Inheritance(#[from] InheritanceError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("failed to recalculate member {user_id}: {source}")]
    MemberRecalculation {
        user_id: UserId,
        #[source]
        source: Box<EngineError>,
    },
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_inheritance_depth: usize,
    pub serialize_per_user: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_inheritance_depth: DEFAULT_MAX_DEPTH,
            serialize_per_user: true,
        }
    }
}

pub fn global_cache_key(user_id: &UserId) -> String {
    format!("global,userId={user_id}")
}

pub fn application_cache_key(user_id: &UserId, application_id: &ApplicationId) -> String {
    format!("application,userId={user_id},appId={application_id}")
}

/// Shared-tier value: a JSON array of snake_case kind names in canonical order.
pub fn encode_permissions<K: Serialize>(kinds: &BTreeSet<K>) -> Result<String, EngineError> {
    serde_json::to_string(kinds).map_err(|e| EngineError::Cache(e.to_string()))
}

pub fn decode_permissions<K: DeserializeOwned + Ord>(raw: &str) -> Result<BTreeSet<K>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Read access to the group, membership, grant, application and user directories.
pub trait GrantSource: Send + Sync {
    /// Non-deleted memberships only.
    fn memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Vec<GroupMembership>, EngineError>> + Send;

    /// Non-deleted memberships only.
    fn memberships_for_group(
        &self,
        group_id: &GroupId,
    ) -> impl Future<Output = Result<Vec<GroupMembership>, EngineError>> + Send;

    /// Ids without a group record are silently absent from the result.
    fn groups_by_id(
        &self,
        ids: &[GroupId],
    ) -> impl Future<Output = Result<Vec<Group>, EngineError>> + Send;

    fn global_grants(
        &self,
        group_id: &GroupId,
    ) -> impl Future<Output = Result<Vec<GlobalGrant>, EngineError>> + Send;

    fn application_grants(
        &self,
        group_id: &GroupId,
    ) -> impl Future<Output = Result<Vec<ApplicationGrant>, EngineError>> + Send;

    fn application_ids(&self) -> impl Future<Output = Result<Vec<ApplicationId>, EngineError>> + Send;

    fn user_exists(&self, user_id: &UserId) -> impl Future<Output = Result<bool, EngineError>> + Send;

    fn remove_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// The durable cache tier: insert-or-replace plus latest-record lookup.
pub trait DurableCache: Send + Sync {
    fn replace_global(
        &self,
        record: &GlobalPermissionCache,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn replace_application(
        &self,
        record: &ApplicationPermissionCache,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn global(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<GlobalPermissionCache>, EngineError>> + Send;

    fn application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> impl Future<Output = Result<Option<ApplicationPermissionCache>, EngineError>> + Send;
}

/// The shared low-latency tier, keyed by [`global_cache_key`] and [`application_cache_key`].
pub trait SharedCache: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, EngineError>> + Send;

    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), EngineError>> + Send;
}
