//! Static "kind A implies kind B" metadata and its transitive closure.
//!
//! The builtin graph is an explicit adjacency map. Closures are resolved once
//! into an [`InheritanceTable`]; the builtin table is a process-wide singleton.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, LazyLock};

use crate::kind::PermissionKind;

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InheritanceError {
    #[error("inheritance cycle detected: {}", render_path(.path))]
    Cycle { path: Vec<PermissionKind> },

    #[error("inheritance depth {depth} exceeded while expanding: {}", render_path(.path))]
    DepthExceeded {
        depth: usize,
        path: Vec<PermissionKind>,
    },
}

fn render_path(path: &[PermissionKind]) -> String {
    path.iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InheritanceGraph {
    edges: BTreeMap<PermissionKind, Vec<PermissionKind>>,
}

impl InheritanceGraph {
    pub fn builtin() -> Self {
        use PermissionKind::*;

        Self::from_edges([
            (Admin, ManageUsers),
            (Admin, ManageGroups),
            (Admin, ManageApplications),
            (ManageUsers, ViewUsers),
            (ManageGroups, ViewGroups),
            (ManageApplications, ViewApplications),
            (ManageApplications, ManageUpdates),
            (ManageBlog, CreateBlogPost),
            (ManageBlog, EditBlogPost),
            (ManageBlog, DeleteBlogPost),
            (ManageFiles, UploadFiles),
            (ManageFiles, ReadFiles),
            (ManageFiles, DeleteFiles),
            (UploadFiles, ReadFiles),
            (ManageUpdates, PublishUpdates),
            (ManageUpdates, ViewUpdates),
        ])
    }

    pub fn from_edges(edges: impl IntoIterator<Item = (PermissionKind, PermissionKind)>) -> Self {
        let mut graph = Self::default();
        for (from, to) in edges {
            let implied = graph.edges.entry(from).or_default();
            if !implied.contains(&to) {
                implied.push(to);
            }
        }
        graph
    }

    pub fn implied_by(&self, kind: PermissionKind) -> &[PermissionKind] {
        self.edges.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every kind reachable from `kind`, excluding `kind` itself.
    pub fn inherited_permissions(
        &self,
        kind: PermissionKind,
        max_depth: usize,
    ) -> Result<BTreeSet<PermissionKind>, InheritanceError> {
        let mut out = BTreeSet::new();
        let mut stack = vec![kind];
        self.walk(kind, &mut stack, &mut out, max_depth)?;
        Ok(out)
    }

    fn walk(
        &self,
        kind: PermissionKind,
        stack: &mut Vec<PermissionKind>,
        out: &mut BTreeSet<PermissionKind>,
        max_depth: usize,
    ) -> Result<(), InheritanceError> {
        if stack.len() > max_depth {
            return Err(InheritanceError::DepthExceeded {
                depth: max_depth,
                path: stack.clone(),
            });
        }

        for &implied in self.implied_by(kind) {
            if stack.contains(&implied) {
                let mut path = stack.clone();
                path.push(implied);
                return Err(InheritanceError::Cycle { path });
            }

            out.insert(implied);
            stack.push(implied);
            self.walk(implied, stack, out, max_depth)?;
            stack.pop();
        }

        Ok(())
    }
}

static EMPTY: BTreeSet<PermissionKind> = BTreeSet::new();

static BUILTIN: LazyLock<Result<Arc<InheritanceTable>, InheritanceError>> = LazyLock::new(|| {
    InheritanceTable::resolve(&InheritanceGraph::builtin(), DEFAULT_MAX_DEPTH).map(Arc::new)
});

/// Memoized closures for every [`PermissionKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritanceTable {
    closures: HashMap<PermissionKind, BTreeSet<PermissionKind>>,
}

impl InheritanceTable {
    pub fn resolve(graph: &InheritanceGraph, max_depth: usize) -> Result<Self, InheritanceError> {
        let mut closures = HashMap::with_capacity(PermissionKind::ALL.len());
        for kind in PermissionKind::ALL {
            closures.insert(kind, graph.inherited_permissions(kind, max_depth)?);
        }
        Ok(Self { closures })
    }

    pub fn builtin() -> Result<Arc<InheritanceTable>, InheritanceError> {
        BUILTIN.as_ref().map(Arc::clone).map_err(Clone::clone)
    }

    pub fn inherited(&self, kind: PermissionKind) -> &BTreeSet<PermissionKind> {
        self.closures.get(&kind).unwrap_or(&EMPTY)
    }

    /// `kind` followed by everything it implies, in write order for a merge.
    pub fn expand(&self, kind: PermissionKind) -> impl Iterator<Item = PermissionKind> + '_ {
        std::iter::once(kind).chain(self.inherited(kind).iter().copied())
    }

    pub fn close(&self, kinds: impl IntoIterator<Item = PermissionKind>) -> BTreeSet<PermissionKind> {
        kinds.into_iter().flat_map(|k| self.expand(k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PermissionKind::*;
    use proptest::prelude::*;

    #[test]
    fn builtin_admin_closure_is_transitive() {
        let graph = InheritanceGraph::builtin();
        let closure = graph.inherited_permissions(Admin, DEFAULT_MAX_DEPTH).unwrap();

        let expected: BTreeSet<_> = [
            ManageUsers,
            ViewUsers,
            ManageGroups,
            ViewGroups,
            ManageApplications,
            ViewApplications,
            ManageUpdates,
            PublishUpdates,
            ViewUpdates,
        ]
        .into_iter()
        .collect();
        assert_eq!(closure, expected);
    }

    #[test]
    fn closure_excludes_the_input_kind() {
        let graph = InheritanceGraph::builtin();
        for kind in PermissionKind::ALL {
            let closure = graph.inherited_permissions(kind, DEFAULT_MAX_DEPTH).unwrap();
            assert!(!closure.contains(&kind), "{kind} contains itself");
        }
    }

    #[test]
    fn leaf_kind_has_empty_closure() {
        let graph = InheritanceGraph::builtin();
        assert!(graph
            .inherited_permissions(ViewUsers, DEFAULT_MAX_DEPTH)
            .unwrap()
            .is_empty());
        assert!(graph
            .inherited_permissions(Superuser, DEFAULT_MAX_DEPTH)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn diamond_paths_are_deduplicated() {
        let graph = InheritanceGraph::builtin();
        let closure = graph.inherited_permissions(ManageFiles, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(
            closure,
            [UploadFiles, ReadFiles, DeleteFiles].into_iter().collect()
        );
    }

    #[test]
    fn two_node_cycle_fails_with_path() {
        let graph = InheritanceGraph::from_edges([(Admin, ManageUsers), (ManageUsers, Admin)]);

        let err = graph.inherited_permissions(Admin, DEFAULT_MAX_DEPTH).unwrap_err();

        assert_eq!(
            err,
            InheritanceError::Cycle {
                path: vec![Admin, ManageUsers, Admin]
            }
        );
        assert!(
            err.to_string().contains("admin -> manage_users -> admin"),
            "unexpected message: {err}"
        );
    }

    #[test]
    fn self_loop_fails() {
        let graph = InheritanceGraph::from_edges([(ManageBlog, ManageBlog)]);

        let err = graph.inherited_permissions(ManageBlog, DEFAULT_MAX_DEPTH).unwrap_err();

        assert!(matches!(err, InheritanceError::Cycle { ref path } if path.len() == 2));
    }

    #[test]
    fn cycle_reachable_from_another_kind_fails() {
        let graph = InheritanceGraph::from_edges([
            (Admin, ManageFiles),
            (ManageFiles, UploadFiles),
            (UploadFiles, ManageFiles),
        ]);

        let err = graph.inherited_permissions(Admin, DEFAULT_MAX_DEPTH).unwrap_err();

        assert_eq!(
            err,
            InheritanceError::Cycle {
                path: vec![Admin, ManageFiles, UploadFiles, ManageFiles]
            }
        );
    }

    #[test]
    fn depth_limit_reports_traversal_stack() {
        let graph = InheritanceGraph::builtin();

        let err = graph.inherited_permissions(ManageApplications, 2).unwrap_err();

        assert!(
            matches!(
                err,
                InheritanceError::DepthExceeded { depth: 2, ref path }
                    if path == &vec![ManageApplications, ManageUpdates, PublishUpdates]
            ),
            "unexpected error: {err}"
        );
        assert!(graph.inherited_permissions(ManageApplications, 3).is_ok());
    }

    #[test]
    fn table_resolution_fails_when_any_kind_is_cyclic() {
        let graph = InheritanceGraph::from_edges([(ViewUsers, ViewGroups), (ViewGroups, ViewUsers)]);

        let result = InheritanceTable::resolve(&graph, DEFAULT_MAX_DEPTH);

        assert!(matches!(result, Err(InheritanceError::Cycle { .. })));
    }

    #[test]
    fn builtin_table_is_shared() {
        let a = InheritanceTable::builtin().unwrap();
        let b = InheritanceTable::builtin().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn expand_yields_kind_before_closure() {
        let table = InheritanceTable::builtin().unwrap();
        let expanded: Vec<_> = table.expand(ManageUsers).collect();
        assert_eq!(expanded, vec![ManageUsers, ViewUsers]);
    }

    #[test]
    fn closure_is_idempotent_for_every_kind() {
        let table = InheritanceTable::builtin().unwrap();
        for kind in PermissionKind::ALL {
            let once = table.close([kind]);
            let twice = table.close(once.iter().copied());
            assert_eq!(once, twice, "closure not idempotent for {kind}");
        }
    }

    proptest! {
        #[test]
        fn closure_of_any_set_is_idempotent(
            kinds in proptest::sample::subsequence(PermissionKind::ALL.to_vec(), 0..=PermissionKind::ALL.len())
        ) {
            let table = InheritanceTable::builtin().unwrap();
            let once = table.close(kinds.iter().copied());
            let twice = table.close(once.iter().copied());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn closure_of_set_contains_every_input(
            kinds in proptest::sample::subsequence(PermissionKind::ALL.to_vec(), 0..=PermissionKind::ALL.len())
        ) {
            let table = InheritanceTable::builtin().unwrap();
            let closed = table.close(kinds.iter().copied());
            for kind in kinds {
                prop_assert!(closed.contains(&kind));
            }
        }
    }
}
