//! Read-through permission queries.
//!
//! Lookups go to the shared tier first and fall back to a full recomputation
//! of the user on a miss. Errors are returned, never collapsed into `false`.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::kind::{PermissionKind, ScopedApplicationPermissionKind};
use crate::legacy;
use crate::model::{ApplicationId, UserId};

use super::resolve::PermissionEngine;
use super::{
    DurableCache, EngineError, GrantSource, SharedCache, application_cache_key,
    decode_permissions, encode_permissions, global_cache_key,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMode {
    /// At least one requested kind is held.
    Any,
    /// Every requested kind is held.
    All,
}

fn satisfies_global(
    held: &BTreeSet<PermissionKind>,
    mode: CheckMode,
    requested: &[PermissionKind],
) -> bool {
    if held.contains(&PermissionKind::Superuser) {
        return true;
    }
    // An empty request is denied in both modes, including `All`.
    if requested.is_empty() {
        return false;
    }

    match mode {
        CheckMode::Any => requested.iter().any(|k| held.contains(k)),
        CheckMode::All => requested.iter().all(|k| held.contains(k)),
    }
}

// Scoped Admin stands in for every scoped kind.
fn satisfies_scoped(
    held: &BTreeSet<ScopedApplicationPermissionKind>,
    requested: &[ScopedApplicationPermissionKind],
) -> bool {
    held.contains(&ScopedApplicationPermissionKind::Admin)
        || requested.iter().any(|k| held.contains(k))
}

impl<G: GrantSource, D: DurableCache, S: SharedCache> PermissionEngine<G, D, S> {
    async fn read_shared<K>(&self, key: &str) -> Result<Option<BTreeSet<K>>, EngineError>
    where
        K: DeserializeOwned + Ord,
    {
        let Some(raw) = self.shared.get(key).await? else {
            return Ok(None);
        };

        match decode_permissions(&raw) {
            Ok(kinds) => Ok(Some(kinds)),
            Err(err) => {
                tracing::warn!(key, error = %err, "discarding undecodable shared cache entry");
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: &UserId) -> Result<BTreeSet<PermissionKind>, EngineError> {
        if let Some(kinds) = self.read_shared(&global_cache_key(user_id)).await? {
            return Ok(kinds);
        }

        tracing::debug!("shared cache miss, recalculating");
        Ok(self.calculate_user(user_id).await?.global)
    }

    /// Scoped permissions for one application. A global superuser always holds
    /// scoped `Admin`; that union is applied per read and never cached.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, application_id = %application_id))]
    pub async fn get_user_by_application(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> Result<BTreeSet<ScopedApplicationPermissionKind>, EngineError> {
        let global = self.get_user(user_id).await?;

        let key = application_cache_key(user_id, application_id);
        let mut scoped = match self.read_shared(&key).await? {
            Some(kinds) => kinds,
            None => {
                tracing::debug!("shared cache miss, recalculating");
                let effective = self.calculate_user(user_id).await?;
                // Unregistered applications get no entry from the recalculation,
                // so store the empty set to keep later reads on the shared tier.
                if !effective.applications.contains_key(application_id) {
                    let scoped = BTreeSet::<ScopedApplicationPermissionKind>::new();
                    self.shared.set(&key, encode_permissions(&scoped)?).await?;
                }
                effective.application(application_id)
            }
        };

        if global.contains(&PermissionKind::Superuser) {
            scoped.insert(ScopedApplicationPermissionKind::Admin);
        }
        Ok(scoped)
    }

    pub async fn check_global_permission(
        &self,
        user_id: &UserId,
        mode: CheckMode,
        kinds: &[PermissionKind],
    ) -> Result<bool, EngineError> {
        let held = self.get_user(user_id).await?;
        Ok(satisfies_global(&held, mode, kinds))
    }

    pub async fn check_application_permission(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
        kinds: &[ScopedApplicationPermissionKind],
    ) -> Result<bool, EngineError> {
        let held = self.get_user_by_application(user_id, application_id).await?;
        Ok(satisfies_scoped(&held, kinds))
    }

    /// Old-style application check expressed in global kinds.
    ///
    /// A global `Any` match over `kinds` plus `Superuser` passes immediately.
    /// Otherwise the kinds are translated to their scoped equivalents and
    /// checked against the application's scoped set.
    pub async fn check_application_permission_legacy(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
        kinds: &[PermissionKind],
    ) -> Result<bool, EngineError> {
        let mut global = kinds.to_vec();
        global.push(PermissionKind::Superuser);
        if self
            .check_global_permission(user_id, CheckMode::Any, &global)
            .await?
        {
            return Ok(true);
        }

        let scoped: Vec<_> = legacy::translate(kinds).into_iter().collect();
        self.check_application_permission(user_id, application_id, &scoped)
            .await
    }
}
