use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use grantwell_core::kind::{PermissionKind, ScopedApplicationPermissionKind};
use grantwell_core::model::{
    ApplicationGrant, ApplicationId, ApplicationPermissionCache, ApplicationScope, GlobalGrant,
    GlobalPermissionCache, Group, GroupId, GroupMembership, UserId,
};

use crate::traits::StorageError;

fn to_storage_error(e: sqlx::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

fn parse_column<T>(value: &str) -> Result<T, StorageError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StorageError::Internal(format!("corrupt row: {e}")))
}

fn parse_kinds<T>(values: &[String]) -> Result<BTreeSet<T>, StorageError>
where
    T: FromStr + Ord,
    T::Err: Display,
{
    values.iter().map(|v| parse_column(v)).collect()
}

fn kind_names<T: AsRef<str>>(kinds: impl IntoIterator<Item = T>) -> Vec<String> {
    kinds.into_iter().map(|k| k.as_ref().to_string()).collect()
}

fn group_from_row((id, name, priority): (Uuid, String, i32)) -> Result<Group, StorageError> {
    let priority = u32::try_from(priority)
        .map_err(|_| StorageError::Internal(format!("negative priority on group {id}")))?;
    Ok(Group::new(GroupId::new(id), name, priority))
}

fn priority_column(group: &Group) -> Result<i32, StorageError> {
    i32::try_from(group.priority).map_err(|_| {
        StorageError::Internal(format!("priority {} out of range", group.priority))
    })
}

pub async fn upsert_group<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    group: &Group,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO groups (id, name, priority) VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, priority = EXCLUDED.priority
        "#,
    )
    .bind(group.id.as_uuid())
    .bind(&group.name)
    .bind(priority_column(group)?)
    .execute(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(())
}

pub async fn delete_group<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    group_id: &GroupId,
) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM groups WHERE id = $1")
        .bind(group_id.as_uuid())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_group<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &GroupId,
) -> Result<Option<Group>, StorageError> {
    let row: Option<(Uuid, String, i32)> =
        sqlx::query_as("SELECT id, name, priority FROM groups WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(executor)
            .await
            .map_err(to_storage_error)?;
    row.map(group_from_row).transpose()
}

pub async fn get_groups<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    ids: &[GroupId],
) -> Result<Vec<Group>, StorageError> {
    let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
    let rows: Vec<(Uuid, String, i32)> =
        sqlx::query_as("SELECT id, name, priority FROM groups WHERE id = ANY($1) ORDER BY id")
            .bind(&ids)
            .fetch_all(executor)
            .await
            .map_err(to_storage_error)?;
    rows.into_iter().map(group_from_row).collect()
}

pub async fn list_groups<'e>(
    executor: impl sqlx::PgExecutor<'e>,
) -> Result<Vec<Group>, StorageError> {
    let rows: Vec<(Uuid, String, i32)> =
        sqlx::query_as("SELECT id, name, priority FROM groups ORDER BY id")
            .fetch_all(executor)
            .await
            .map_err(to_storage_error)?;
    rows.into_iter().map(group_from_row).collect()
}

pub async fn insert_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: &UserId,
) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(user_id.as_uuid())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn delete_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: &UserId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id.as_uuid())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn user_exists<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: &UserId,
) -> Result<bool, StorageError> {
    let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id.as_uuid())
        .fetch_one(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(row.0)
}

pub async fn insert_application<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    application_id: &ApplicationId,
) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO applications (id) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(application_id.as_uuid())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn application_ids<'e>(
    executor: impl sqlx::PgExecutor<'e>,
) -> Result<Vec<ApplicationId>, StorageError> {
    let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM applications ORDER BY created_at, id")
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(|(id,)| ApplicationId::new(id)).collect())
}

pub async fn insert_membership<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO group_memberships (group_id, user_id) VALUES ($1, $2)
        ON CONFLICT (group_id, user_id) DO UPDATE SET deleted = false
        "#,
    )
    .bind(group_id.as_uuid())
    .bind(user_id.as_uuid())
    .execute(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(())
}

pub async fn soft_delete_membership<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<bool, StorageError> {
    let result =
        sqlx::query("UPDATE group_memberships SET deleted = true WHERE group_id = $1 AND user_id = $2")
            .bind(group_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(executor)
            .await
            .map_err(to_storage_error)?;
    Ok(result.rows_affected() > 0)
}

pub async fn memberships_for_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: &UserId,
) -> Result<Vec<GroupMembership>, StorageError> {
    let rows: Vec<(Uuid, Uuid, bool)> = sqlx::query_as(
        "SELECT group_id, user_id, deleted FROM group_memberships WHERE user_id = $1 AND NOT deleted ORDER BY id",
    )
    .bind(user_id.as_uuid())
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(membership_from_row).collect())
}

pub async fn memberships_for_group<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    group_id: &GroupId,
) -> Result<Vec<GroupMembership>, StorageError> {
    let rows: Vec<(Uuid, Uuid, bool)> = sqlx::query_as(
        "SELECT group_id, user_id, deleted FROM group_memberships WHERE group_id = $1 AND NOT deleted ORDER BY id",
    )
    .bind(group_id.as_uuid())
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(membership_from_row).collect())
}

fn membership_from_row((group_id, user_id, deleted): (Uuid, Uuid, bool)) -> GroupMembership {
    GroupMembership {
        group_id: GroupId::new(group_id),
        user_id: UserId::new(user_id),
        deleted,
    }
}

pub async fn upsert_global_grant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    grant: &GlobalGrant,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO group_global_grants (group_id, kind, allow) VALUES ($1, $2, $3)
        ON CONFLICT (group_id, kind) DO UPDATE SET allow = EXCLUDED.allow
        "#,
    )
    .bind(grant.group_id.as_uuid())
    .bind(grant.kind.as_str())
    .bind(grant.allow)
    .execute(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(())
}

pub async fn delete_global_grant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    group_id: &GroupId,
    kind: PermissionKind,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM group_global_grants WHERE group_id = $1 AND kind = $2")
        .bind(group_id.as_uuid())
        .bind(kind.as_str())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn global_grants<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    group_id: &GroupId,
) -> Result<Vec<GlobalGrant>, StorageError> {
    let rows: Vec<(Uuid, String, bool)> = sqlx::query_as(
        "SELECT group_id, kind, allow FROM group_global_grants WHERE group_id = $1 ORDER BY id",
    )
    .bind(group_id.as_uuid())
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;

    rows.into_iter()
        .map(|(group_id, kind, allow)| {
            Ok(GlobalGrant {
                group_id: GroupId::new(group_id),
                kind: parse_column(&kind)?,
                allow,
            })
        })
        .collect()
}

pub async fn upsert_application_grant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    grant: &ApplicationGrant,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO group_application_grants (group_id, application_id, kind, allow)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (group_id, application_id, kind) DO UPDATE SET allow = EXCLUDED.allow
        "#,
    )
    .bind(grant.group_id.as_uuid())
    .bind(grant.scope.application_id().map(|id| *id.as_uuid()))
    .bind(grant.kind.as_str())
    .bind(grant.allow)
    .execute(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(())
}

pub async fn delete_application_grant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    group_id: &GroupId,
    scope: ApplicationScope,
    kind: ScopedApplicationPermissionKind,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        DELETE FROM group_application_grants
        WHERE group_id = $1 AND application_id IS NOT DISTINCT FROM $2 AND kind = $3
        "#,
    )
    .bind(group_id.as_uuid())
    .bind(scope.application_id().map(|id| *id.as_uuid()))
    .bind(kind.as_str())
    .execute(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(())
}

pub async fn application_grants<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    group_id: &GroupId,
) -> Result<Vec<ApplicationGrant>, StorageError> {
    let rows: Vec<(Uuid, Option<Uuid>, String, bool)> = sqlx::query_as(
        r#"
        SELECT group_id, application_id, kind, allow
        FROM group_application_grants WHERE group_id = $1 ORDER BY id
        "#,
    )
    .bind(group_id.as_uuid())
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;

    rows.into_iter()
        .map(|(group_id, application_id, kind, allow)| {
            Ok(ApplicationGrant::new(
                GroupId::new(group_id),
                application_id.map(ApplicationId::new).into(),
                parse_column(&kind)?,
                allow,
            ))
        })
        .collect()
}

pub async fn upsert_global_cache<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    record: &GlobalPermissionCache,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO global_permission_caches (user_id, permissions, created_at, updated_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO UPDATE
        SET permissions = EXCLUDED.permissions, updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(record.user_id.as_uuid())
    .bind(kind_names(record.permissions.iter().map(|k| k.as_str())))
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(())
}

pub async fn upsert_application_cache<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    record: &ApplicationPermissionCache,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO application_permission_caches
            (user_id, application_id, permissions, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, application_id) DO UPDATE
        SET permissions = EXCLUDED.permissions, updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(record.user_id.as_uuid())
    .bind(record.application_id.as_uuid())
    .bind(kind_names(record.permissions.iter().map(|k| k.as_str())))
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(())
}

pub async fn latest_global_cache<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: &UserId,
) -> Result<Option<GlobalPermissionCache>, StorageError> {
    let row: Option<(Vec<String>, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT permissions, created_at, updated_at FROM global_permission_caches
        WHERE user_id = $1 ORDER BY updated_at DESC LIMIT 1
        "#,
    )
    .bind(user_id.as_uuid())
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;

    row.map(|(permissions, created_at, updated_at)| {
        Ok(GlobalPermissionCache {
            user_id: *user_id,
            permissions: parse_kinds(&permissions)?,
            created_at,
            updated_at,
        })
    })
    .transpose()
}

pub async fn latest_application_cache<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: &UserId,
    application_id: &ApplicationId,
) -> Result<Option<ApplicationPermissionCache>, StorageError> {
    let row: Option<(Vec<String>, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT permissions, created_at, updated_at FROM application_permission_caches
        WHERE user_id = $1 AND application_id = $2 ORDER BY updated_at DESC LIMIT 1
        "#,
    )
    .bind(user_id.as_uuid())
    .bind(application_id.as_uuid())
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;

    row.map(|(permissions, created_at, updated_at)| {
        Ok(ApplicationPermissionCache {
            user_id: *user_id,
            application_id: *application_id,
            permissions: parse_kinds(&permissions)?,
            created_at,
            updated_at,
        })
    })
    .transpose()
}
