//! Translation of old-style global permission checks into scoped kinds.
//!
//! Only consulted by the legacy application check; never affects what gets cached.

use std::collections::BTreeSet;

use crate::kind::{PermissionKind, ScopedApplicationPermissionKind};

pub fn scoped_equivalents(kind: PermissionKind) -> &'static [ScopedApplicationPermissionKind] {
    use ScopedApplicationPermissionKind as Scoped;

    match kind {
        PermissionKind::Admin => &[Scoped::Admin],
        PermissionKind::ManageApplications => &[Scoped::EditDetails, Scoped::ManageUpdates],
        PermissionKind::ViewApplications => &[Scoped::ViewDetails],
        PermissionKind::ManageUpdates => &[Scoped::ManageUpdates, Scoped::PublishUpdates],
        PermissionKind::PublishUpdates => &[Scoped::PublishUpdates],
        PermissionKind::ViewUpdates => &[Scoped::ViewUpdates],
        PermissionKind::ManageFiles => &[Scoped::ManageFiles],
        _ => &[],
    }
}

pub fn translate(kinds: &[PermissionKind]) -> BTreeSet<ScopedApplicationPermissionKind> {
    kinds
        .iter()
        .flat_map(|k| scoped_equivalents(*k).iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_maps_to_scoped_admin() {
        assert_eq!(
            scoped_equivalents(PermissionKind::Admin),
            &[ScopedApplicationPermissionKind::Admin]
        );
    }

    #[test]
    fn some_kinds_map_to_several_scoped_kinds() {
        assert_eq!(scoped_equivalents(PermissionKind::ManageApplications).len(), 2);
        assert_eq!(scoped_equivalents(PermissionKind::ManageUpdates).len(), 2);
    }

    #[test]
    fn unmapped_kinds_translate_to_nothing() {
        assert!(scoped_equivalents(PermissionKind::Superuser).is_empty());
        assert!(translate(&[PermissionKind::ManageBlog, PermissionKind::ViewUsers]).is_empty());
    }

    #[test]
    fn translate_unions_and_deduplicates() {
        let scoped = translate(&[PermissionKind::ManageApplications, PermissionKind::ManageUpdates]);

        assert_eq!(
            scoped,
            [
                ScopedApplicationPermissionKind::EditDetails,
                ScopedApplicationPermissionKind::ManageUpdates,
                ScopedApplicationPermissionKind::PublishUpdates,
            ]
            .into_iter()
            .collect()
        );
    }
}
