//! Ordered merge of group grants.
//!
//! Groups are visited by [`visit_order`] (priority descending, then group id).
//! Every grant is applied to an [`OrderedMerge`] whose single rule is
//! "last applied wins". Under that visit order the lowest-priority group
//! decides a conflict. Within one group, specific application grants are
//! applied before wildcard grants, so the group's wildcard decides.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::inheritance::InheritanceTable;
use crate::kind::{PermissionKind, ScopedApplicationPermissionKind};
use crate::model::{ApplicationGrant, ApplicationId, ApplicationScope, GlobalGrant, Group};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMerge<K> {
    resolved: BTreeMap<K, bool>,
}

impl<K: Ord + Copy> Default for OrderedMerge<K> {
    fn default() -> Self {
        Self {
            resolved: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> OrderedMerge<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied wins.
    pub fn apply(&mut self, kind: K, allow: bool) {
        self.resolved.insert(kind, allow);
    }

    pub fn resolved(&self, kind: K) -> Option<bool> {
        self.resolved.get(&kind).copied()
    }

    pub fn allowed(&self) -> BTreeSet<K> {
        self.resolved
            .iter()
            .filter(|(_, allow)| **allow)
            .map(|(kind, _)| *kind)
            .collect()
    }
}

/// One group together with the grants read for it.
#[derive(Debug, Clone)]
pub struct GroupGrants {
    pub group: Group,
    pub global: Vec<GlobalGrant>,
    pub application: Vec<ApplicationGrant>,
}

pub fn visit_order(mut groups: Vec<Group>) -> Vec<Group> {
    groups.sort_by_key(|g| (Reverse(g.priority), g.id));
    groups
}

pub fn merge_global(groups: &[GroupGrants], table: &InheritanceTable) -> OrderedMerge<PermissionKind> {
    let mut merge = OrderedMerge::new();
    for entry in groups {
        for grant in &entry.global {
            for kind in table.expand(grant.kind) {
                merge.apply(kind, grant.allow);
            }
        }
    }
    merge
}

pub fn merge_application(
    groups: &[GroupGrants],
    application_id: ApplicationId,
) -> OrderedMerge<ScopedApplicationPermissionKind> {
    let specific = ApplicationScope::Application(application_id);

    let mut merge = OrderedMerge::new();
    for entry in groups {
        let in_scope = |scope: ApplicationScope| {
            entry
                .application
                .iter()
                .filter(move |grant| grant.scope == scope)
        };

        for grant in in_scope(specific).chain(in_scope(ApplicationScope::Wildcard)) {
            merge.apply(grant.kind, grant.allow);
        }
    }
    merge
}
