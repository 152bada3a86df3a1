use grantwell_core::model::{GroupId, UserId};

pub fn audit_user_recalculated(user_id: &UserId, global_count: usize, application_count: usize) {
    tracing::info!(
        target: "audit",
        event = "user_recalculated",
        user_id = %user_id,
        global_count = global_count,
        application_count = application_count,
        "user permissions recalculated"
    );
}

pub fn audit_group_recalculated(group_id: &GroupId, recalculated: usize, removed_orphans: usize) {
    tracing::info!(
        target: "audit",
        event = "group_recalculated",
        group_id = %group_id,
        recalculated = recalculated,
        removed_orphans = removed_orphans,
        "group members recalculated"
    );
}

pub fn audit_orphan_membership_removed(group_id: &GroupId, user_id: &UserId) {
    tracing::info!(
        target: "audit",
        event = "orphan_membership_removed",
        group_id = %group_id,
        user_id = %user_id,
        "membership of missing user removed"
    );
}

/// `check` names the kind of check that was denied, e.g. `global`.
pub fn audit_authorization_failed_closed(user_id: &UserId, check: &str, reason: &str) {
    tracing::warn!(
        target: "audit",
        event = "authorization_failed_closed",
        user_id = %user_id,
        check = check,
        reason = reason,
        "authorization denied after error"
    );
}
