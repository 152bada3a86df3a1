use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kind::{PermissionKind, ScopedApplicationPermissionKind};

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(UserId);
uuid_id!(GroupId);
uuid_id!(ApplicationId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub priority: u32,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>, priority: u32) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMembership {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub deleted: bool,
}

impl GroupMembership {
    pub fn new(group_id: GroupId, user_id: UserId) -> Self {
        Self {
            group_id,
            user_id,
            deleted: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalGrant {
    pub group_id: GroupId,
    pub kind: PermissionKind,
    pub allow: bool,
}

impl GlobalGrant {
    pub fn allow(group_id: GroupId, kind: PermissionKind) -> Self {
        Self {
            group_id,
            kind,
            allow: true,
        }
    }

    pub fn deny(group_id: GroupId, kind: PermissionKind) -> Self {
        Self {
            group_id,
            kind,
            allow: false,
        }
    }
}

/// Which applications an application grant covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationScope {
    Wildcard,
    Application(ApplicationId),
}

impl ApplicationScope {
    pub fn application_id(&self) -> Option<ApplicationId> {
        match self {
            ApplicationScope::Wildcard => None,
            ApplicationScope::Application(id) => Some(*id),
        }
    }
}

impl From<Option<ApplicationId>> for ApplicationScope {
    fn from(id: Option<ApplicationId>) -> Self {
        match id {
            Some(id) => ApplicationScope::Application(id),
            None => ApplicationScope::Wildcard,
        }
    }
}

impl fmt::Display for ApplicationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationScope::Wildcard => f.write_str("*"),
            ApplicationScope::Application(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationGrant {
    pub group_id: GroupId,
    pub scope: ApplicationScope,
    pub kind: ScopedApplicationPermissionKind,
    pub allow: bool,
}

impl ApplicationGrant {
    pub fn new(
        group_id: GroupId,
        scope: ApplicationScope,
        kind: ScopedApplicationPermissionKind,
        allow: bool,
    ) -> Self {
        Self {
            group_id,
            scope,
            kind,
            allow,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPermissionCache {
    pub user_id: UserId,
    pub permissions: BTreeSet<PermissionKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationPermissionCache {
    pub user_id: UserId,
    pub application_id: ApplicationId,
    pub permissions: BTreeSet<ScopedApplicationPermissionKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One user's resolved permissions, computed in memory before any cache write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectivePermissions {
    pub global: BTreeSet<PermissionKind>,
    pub applications: BTreeMap<ApplicationId, BTreeSet<ScopedApplicationPermissionKind>>,
}

impl EffectivePermissions {
    pub fn application(&self, id: &ApplicationId) -> BTreeSet<ScopedApplicationPermissionKind> {
        self.applications.get(id).cloned().unwrap_or_default()
    }
}
