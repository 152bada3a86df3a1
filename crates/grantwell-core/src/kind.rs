use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {family} permission: '{name}'")]
pub struct ParseKindError {
    pub family: &'static str,
    pub name: String,
}

/// Global permission identifiers. Declaration order is the canonical ordering
/// used for cached sets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    Superuser,
    Admin,
    ManageUsers,
    ViewUsers,
    ManageGroups,
    ViewGroups,
    ManageApplications,
    ViewApplications,
    ManageBlog,
    CreateBlogPost,
    EditBlogPost,
    DeleteBlogPost,
    ManageFiles,
    UploadFiles,
    ReadFiles,
    DeleteFiles,
    ManageUpdates,
    PublishUpdates,
    ViewUpdates,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 19] = [
        PermissionKind::Superuser,
        PermissionKind::Admin,
        PermissionKind::ManageUsers,
        PermissionKind::ViewUsers,
        PermissionKind::ManageGroups,
        PermissionKind::ViewGroups,
        PermissionKind::ManageApplications,
        PermissionKind::ViewApplications,
        PermissionKind::ManageBlog,
        PermissionKind::CreateBlogPost,
        PermissionKind::EditBlogPost,
        PermissionKind::DeleteBlogPost,
        PermissionKind::ManageFiles,
        PermissionKind::UploadFiles,
        PermissionKind::ReadFiles,
        PermissionKind::DeleteFiles,
        PermissionKind::ManageUpdates,
        PermissionKind::PublishUpdates,
        PermissionKind::ViewUpdates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKind::Superuser => "superuser",
            PermissionKind::Admin => "admin",
            PermissionKind::ManageUsers => "manage_users",
            PermissionKind::ViewUsers => "view_users",
            PermissionKind::ManageGroups => "manage_groups",
            PermissionKind::ViewGroups => "view_groups",
            PermissionKind::ManageApplications => "manage_applications",
            PermissionKind::ViewApplications => "view_applications",
            PermissionKind::ManageBlog => "manage_blog",
            PermissionKind::CreateBlogPost => "create_blog_post",
            PermissionKind::EditBlogPost => "edit_blog_post",
            PermissionKind::DeleteBlogPost => "delete_blog_post",
            PermissionKind::ManageFiles => "manage_files",
            PermissionKind::UploadFiles => "upload_files",
            PermissionKind::ReadFiles => "read_files",
            PermissionKind::DeleteFiles => "delete_files",
            PermissionKind::ManageUpdates => "manage_updates",
            PermissionKind::PublishUpdates => "publish_updates",
            PermissionKind::ViewUpdates => "view_updates",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseKindError {
                family: "global",
                name: s.to_string(),
            })
    }
}

/// Permission identifiers that only carry meaning inside one application.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ScopedApplicationPermissionKind {
    Admin,
    ViewDetails,
    EditDetails,
    ManageUpdates,
    PublishUpdates,
    ViewUpdates,
    ManageFiles,
}

impl ScopedApplicationPermissionKind {
    pub const ALL: [ScopedApplicationPermissionKind; 7] = [
        ScopedApplicationPermissionKind::Admin,
        ScopedApplicationPermissionKind::ViewDetails,
        ScopedApplicationPermissionKind::EditDetails,
        ScopedApplicationPermissionKind::ManageUpdates,
        ScopedApplicationPermissionKind::PublishUpdates,
        ScopedApplicationPermissionKind::ViewUpdates,
        ScopedApplicationPermissionKind::ManageFiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopedApplicationPermissionKind::Admin => "admin",
            ScopedApplicationPermissionKind::ViewDetails => "view_details",
            ScopedApplicationPermissionKind::EditDetails => "edit_details",
            ScopedApplicationPermissionKind::ManageUpdates => "manage_updates",
            ScopedApplicationPermissionKind::PublishUpdates => "publish_updates",
            ScopedApplicationPermissionKind::ViewUpdates => "view_updates",
            ScopedApplicationPermissionKind::ManageFiles => "manage_files",
        }
    }
}

impl fmt::Display for ScopedApplicationPermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopedApplicationPermissionKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScopedApplicationPermissionKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseKindError {
                family: "application",
                name: s.to_string(),
            })
    }
}
