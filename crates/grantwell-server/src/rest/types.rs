use std::collections::{BTreeMap, BTreeSet};

use grantwell_core::engine::CheckMode;
use grantwell_core::kind::{PermissionKind, ScopedApplicationPermissionKind};
use grantwell_core::model::{ApplicationId, GroupId, UserId};
use serde::{Deserialize, Serialize};

fn default_mode() -> CheckMode {
    CheckMode::Any
}

#[derive(Debug, Deserialize)]
pub struct CheckGlobalRequest {
    pub user_id: String,
    #[serde(default = "default_mode")]
    pub mode: CheckMode,
    pub permissions: Vec<String>,
}

/// Body of both application check endpoints. The legacy endpoint reads
/// `permissions` as global kind names, the scoped one as scoped kind names.
#[derive(Debug, Deserialize)]
pub struct CheckApplicationRequest {
    pub user_id: String,
    pub application_id: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct UserPermissionsResponse {
    pub user_id: UserId,
    pub permissions: BTreeSet<PermissionKind>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationPermissionsResponse {
    pub user_id: UserId,
    pub application_id: ApplicationId,
    pub permissions: BTreeSet<ScopedApplicationPermissionKind>,
}

#[derive(Debug, Serialize)]
pub struct UserRecalculationResponse {
    pub user_id: UserId,
    pub global: BTreeSet<PermissionKind>,
    pub applications: BTreeMap<ApplicationId, BTreeSet<ScopedApplicationPermissionKind>>,
}

#[derive(Debug, Serialize)]
pub struct GroupRecalculationResponse {
    pub group_id: GroupId,
    pub recalculated: Vec<UserId>,
    pub removed_orphans: Vec<UserId>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
