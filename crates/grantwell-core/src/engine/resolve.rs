use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::inheritance::{DEFAULT_MAX_DEPTH, InheritanceError, InheritanceGraph, InheritanceTable};
use crate::model::{
    ApplicationId, ApplicationPermissionCache, EffectivePermissions, GlobalPermissionCache,
    GroupId, UserId,
};

use super::locks::UserLocks;
use super::merge::{GroupGrants, merge_application, merge_global, visit_order};
use super::{
    DurableCache, EngineConfig, EngineError, GrantSource, SharedCache, application_cache_key,
    encode_permissions, global_cache_key,
};

/// Outcome of a group-wide recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecalculation {
    pub group_id: GroupId,
    pub recalculated: Vec<UserId>,
    pub removed_orphans: Vec<UserId>,
}

enum MemberOutcome {
    Recalculated,
    Orphaned,
}

pub struct PermissionEngine<G: GrantSource, D: DurableCache, S: SharedCache> {
    pub(super) source: Arc<G>,
    pub(super) durable: Arc<D>,
    pub(super) shared: Arc<S>,
    inheritance: Result<Arc<InheritanceTable>, InheritanceError>,
    config: EngineConfig,
    locks: UserLocks,
}

impl<G: GrantSource, D: DurableCache, S: SharedCache> PermissionEngine<G, D, S> {
    pub fn new(source: Arc<G>, durable: Arc<D>, shared: Arc<S>, config: EngineConfig) -> Self {
        let inheritance = if config.max_inheritance_depth == DEFAULT_MAX_DEPTH {
            InheritanceTable::builtin()
        } else {
            InheritanceTable::resolve(&InheritanceGraph::builtin(), config.max_inheritance_depth)
                .map(Arc::new)
        };

        Self {
            source,
            durable,
            shared,
            inheritance,
            config,
            locks: UserLocks::default(),
        }
    }

    /// Replaces the builtin inheritance metadata. A defective graph is not
    /// rejected here; every recomputation fails with its error instead.
    pub fn with_inheritance(mut self, graph: &InheritanceGraph) -> Self {
        self.inheritance =
            InheritanceTable::resolve(graph, self.config.max_inheritance_depth).map(Arc::new);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn inheritance(&self) -> Result<&InheritanceTable, EngineError> {
        self.inheritance
            .as_deref()
            .map_err(|e| EngineError::Inheritance(e.clone()))
    }

    /// Recomputes one user from current grant state and replaces both cache tiers.
    ///
    /// Every read happens before the first write, so a failing read leaves the
    /// caches untouched.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn calculate_user(&self, user_id: &UserId) -> Result<EffectivePermissions, EngineError> {
        let _guard = if self.config.serialize_per_user {
            Some(self.locks.acquire(user_id).await)
        } else {
            None
        };

        let (effective, application_ids) = self.resolve_user(user_id).await?;
        self.persist(user_id, &effective, &application_ids).await?;

        tracing::debug!(
            global = effective.global.len(),
            applications = application_ids.len(),
            "user permissions recalculated"
        );
        Ok(effective)
    }

    async fn resolve_user(
        &self,
        user_id: &UserId,
    ) -> Result<(EffectivePermissions, Vec<ApplicationId>), EngineError> {
        let table = self.inheritance()?;

        let memberships = self.source.memberships_for_user(user_id).await?;
        let group_ids: Vec<GroupId> = memberships
            .iter()
            .filter(|m| !m.deleted)
            .map(|m| m.group_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let groups = if group_ids.is_empty() {
            Vec::new()
        } else {
            self.source.groups_by_id(&group_ids).await?
        };
        if groups.len() < group_ids.len() {
            tracing::debug!(
                missing = group_ids.len() - groups.len(),
                "skipping memberships whose group no longer exists"
            );
        }

        let mut ordered = Vec::with_capacity(groups.len());
        for group in visit_order(groups) {
            let global = self.source.global_grants(&group.id).await?;
            let application = self.source.application_grants(&group.id).await?;
            ordered.push(GroupGrants {
                group,
                global,
                application,
            });
        }

        let application_ids = self.source.application_ids().await?;

        let global = merge_global(&ordered, table).allowed();
        let applications = application_ids
            .iter()
            .map(|id| (*id, merge_application(&ordered, *id).allowed()))
            .collect();

        Ok((
            EffectivePermissions {
                global,
                applications,
            },
            application_ids,
        ))
    }

    async fn persist(
        &self,
        user_id: &UserId,
        effective: &EffectivePermissions,
        application_ids: &[ApplicationId],
    ) -> Result<(), EngineError> {
        let now = Utc::now();

        self.durable
            .replace_global(&GlobalPermissionCache {
                user_id: *user_id,
                permissions: effective.global.clone(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        for application_id in application_ids {
            self.durable
                .replace_application(&ApplicationPermissionCache {
                    user_id: *user_id,
                    application_id: *application_id,
                    permissions: effective.application(application_id),
                    created_at: now,
                    updated_at: now,
                })
                .await?;
        }

        self.shared
            .set(&global_cache_key(user_id), encode_permissions(&effective.global)?)
            .await?;

        for application_id in application_ids {
            let value = encode_permissions(&effective.application(application_id))?;
            self.shared
                .set(&application_cache_key(user_id, application_id), value)
                .await?;
        }

        Ok(())
    }

    /// Recomputes every member of a group, removing memberships of users that no
    /// longer exist. The first member failure aborts the remaining batch.
    #[tracing::instrument(skip(self), fields(group_id = %group_id))]
    pub async fn calculate_group(&self, group_id: &GroupId) -> Result<GroupRecalculation, EngineError> {
        let memberships = self.source.memberships_for_group(group_id).await?;

        let mut outcome = GroupRecalculation {
            group_id: *group_id,
            recalculated: Vec::new(),
            removed_orphans: Vec::new(),
        };

        for membership in memberships.iter().filter(|m| !m.deleted) {
            let user_id = membership.user_id;
            match self.recalculate_member(group_id, &user_id).await {
                Ok(MemberOutcome::Recalculated) => outcome.recalculated.push(user_id),
                Ok(MemberOutcome::Orphaned) => {
                    tracing::debug!(user_id = %user_id, "removed orphaned membership");
                    outcome.removed_orphans.push(user_id);
                }
                Err(source) => {
                    return Err(EngineError::MemberRecalculation {
                        user_id,
                        source: Box::new(source),
                    });
                }
            }
        }

        tracing::debug!(
            recalculated = outcome.recalculated.len(),
            removed_orphans = outcome.removed_orphans.len(),
            "group members recalculated"
        );
        Ok(outcome)
    }

    async fn recalculate_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<MemberOutcome, EngineError> {
        if !self.source.user_exists(user_id).await? {
            self.source.remove_membership(group_id, user_id).await?;
            return Ok(MemberOutcome::Orphaned);
        }

        self.calculate_user(user_id).await?;
        Ok(MemberOutcome::Recalculated)
    }

    pub async fn cached_global(
        &self,
        user_id: &UserId,
    ) -> Result<Option<GlobalPermissionCache>, EngineError> {
        self.durable.global(user_id).await
    }

    pub async fn cached_application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationPermissionCache>, EngineError> {
        self.durable.application(user_id, application_id).await
    }
}
