use std::collections::BTreeSet;
use std::sync::Arc;

use grantwell_core::engine::merge::visit_order;
use grantwell_core::engine::{CheckMode, EngineConfig, GroupRecalculation, PermissionEngine};
use grantwell_core::kind::{PermissionKind, ScopedApplicationPermissionKind};
use grantwell_core::model::{
    ApplicationId, ApplicationPermissionCache, EffectivePermissions, GlobalPermissionCache, Group,
    GroupId, UserId,
};
use grantwell_storage::{DirectoryStore, PermissionCacheStore, SharedCacheStore};

use crate::adapter::{StoreDurableCache, StoreGrantSource, StoreSharedCache};
use crate::audit;
use crate::error::ApiError;
use crate::metrics::Metrics;

pub type Engine<D, C, S> =
    PermissionEngine<StoreGrantSource<D>, StoreDurableCache<C>, StoreSharedCache<S>>;

/// Everything `show-user` prints about one user.
#[derive(Debug)]
pub struct UserReport {
    pub user_id: UserId,
    pub groups: Vec<Group>,
    pub cached_global: Option<GlobalPermissionCache>,
    pub cached_application: Option<ApplicationPermissionCache>,
    pub effective_global: BTreeSet<PermissionKind>,
    pub effective_application: Option<BTreeSet<ScopedApplicationPermissionKind>>,
}

pub struct PermissionService<D, C, S>
where
    D: DirectoryStore,
    C: PermissionCacheStore,
    S: SharedCacheStore,
{
    directory: Arc<D>,
    engine: Engine<D, C, S>,
    metrics: Arc<Metrics>,
}

impl<D, C, S> PermissionService<D, C, S>
where
    D: DirectoryStore,
    C: PermissionCacheStore,
    S: SharedCacheStore,
{
    pub fn new(
        directory: Arc<D>,
        caches: Arc<C>,
        shared: Arc<S>,
        config: EngineConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let engine = PermissionEngine::new(
            Arc::new(StoreGrantSource::new(Arc::clone(&directory))),
            Arc::new(StoreDurableCache::new(caches)),
            Arc::new(StoreSharedCache::new(shared, Arc::clone(&metrics))),
            config,
        );
        Self {
            directory,
            engine,
            metrics,
        }
    }

    pub fn engine(&self) -> &Engine<D, C, S> {
        &self.engine
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<BTreeSet<PermissionKind>, ApiError> {
        Ok(self.engine.get_user(user_id).await?)
    }

    pub async fn get_user_by_application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> Result<BTreeSet<ScopedApplicationPermissionKind>, ApiError> {
        Ok(self
            .engine
            .get_user_by_application(user_id, application_id)
            .await?)
    }

    pub async fn check_global(
        &self,
        user_id: &UserId,
        mode: CheckMode,
        kinds: &[PermissionKind],
    ) -> Result<bool, ApiError> {
        Ok(self
            .engine
            .check_global_permission(user_id, mode, kinds)
            .await?)
    }

    pub async fn check_application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
        kinds: &[ScopedApplicationPermissionKind],
    ) -> Result<bool, ApiError> {
        Ok(self
            .engine
            .check_application_permission(user_id, application_id, kinds)
            .await?)
    }

    pub async fn check_application_legacy(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
        kinds: &[PermissionKind],
    ) -> Result<bool, ApiError> {
        Ok(self
            .engine
            .check_application_permission_legacy(user_id, application_id, kinds)
            .await?)
    }

    pub async fn authorize_global(
        &self,
        user_id: &UserId,
        mode: CheckMode,
        kinds: &[PermissionKind],
    ) -> bool {
        let result = self.check_global(user_id, mode, kinds).await;
        self.fail_closed(user_id, "global", result)
    }

    pub async fn authorize_application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
        kinds: &[ScopedApplicationPermissionKind],
    ) -> bool {
        let result = self.check_application(user_id, application_id, kinds).await;
        self.fail_closed(user_id, "application", result)
    }

    pub async fn authorize_application_legacy(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
        kinds: &[PermissionKind],
    ) -> bool {
        let result = self
            .check_application_legacy(user_id, application_id, kinds)
            .await;
        self.fail_closed(user_id, "application_legacy", result)
    }

    fn fail_closed(&self, user_id: &UserId, check: &str, result: Result<bool, ApiError>) -> bool {
        match result {
            Ok(allowed) => allowed,
            Err(err) => {
                tracing::warn!(user_id = %user_id, check, error = %err, "permission check failed, denying");
                audit::audit_authorization_failed_closed(user_id, check, &err.to_string());
                self.metrics.record_fail_closed();
                false
            }
        }
    }

    pub async fn recalculate_user(
        &self,
        user_id: &UserId,
    ) -> Result<EffectivePermissions, ApiError> {
        let effective = self.engine.calculate_user(user_id).await?;

        self.metrics.record_user_recalculation();
        audit::audit_user_recalculated(
            user_id,
            effective.global.len(),
            effective.applications.len(),
        );
        Ok(effective)
    }

    pub async fn recalculate_group(
        &self,
        group_id: &GroupId,
    ) -> Result<GroupRecalculation, ApiError> {
        let outcome = self.engine.calculate_group(group_id).await?;

        self.metrics.record_group_recalculation();
        for user_id in &outcome.removed_orphans {
            audit::audit_orphan_membership_removed(group_id, user_id);
        }
        audit::audit_group_recalculated(
            group_id,
            outcome.recalculated.len(),
            outcome.removed_orphans.len(),
        );
        Ok(outcome)
    }

    pub async fn show_user(
        &self,
        user_id: &UserId,
        application_id: Option<&ApplicationId>,
    ) -> Result<UserReport, ApiError> {
        let group_ids: Vec<GroupId> = self
            .directory
            .memberships_for_user(user_id)
            .await?
            .into_iter()
            .map(|m| m.group_id)
            .collect();
        let groups = visit_order(self.directory.get_groups(&group_ids).await?);

        let cached_global = self.engine.cached_global(user_id).await?;
        let effective_global = self.get_user(user_id).await?;

        let (cached_application, effective_application) = match application_id {
            Some(app) => (
                self.engine.cached_application(user_id, app).await?,
                Some(self.get_user_by_application(user_id, app).await?),
            ),
            None => (None, None),
        };

        Ok(UserReport {
            user_id: *user_id,
            groups,
            cached_global,
            cached_application,
            effective_global,
            effective_application,
        })
    }
}
