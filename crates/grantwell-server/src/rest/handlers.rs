use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use grantwell_core::kind::ParseKindError;
use grantwell_core::model::{ApplicationId, GroupId, UserId};
use grantwell_storage::{DirectoryStore, PermissionCacheStore, SharedCacheStore};

use crate::error::ApiError;

use super::AppState;
use super::types::*;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn api_error_to_response(err: ApiError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        ApiError::InvalidId { .. } | ApiError::UnknownPermission(_) => StatusCode::BAD_REQUEST,
        e if e.is_inheritance_defect() => StatusCode::UNPROCESSABLE_ENTITY,
        ApiError::Engine(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn parse_id<T: FromStr>(field: &'static str, value: &str) -> Result<T, ApiError> {
    value.parse().map_err(|_| ApiError::InvalidId {
        field,
        value: value.to_string(),
    })
}

fn parse_kinds<K>(names: &[String]) -> Result<Vec<K>, ApiError>
where
    K: FromStr<Err = ParseKindError>,
{
    names
        .iter()
        .map(|n| n.parse::<K>().map_err(ApiError::from))
        .collect()
}

pub async fn get_user_permissions<D, C, S>(
    State(state): State<AppState<D, C, S>>,
    Path(user_id): Path<String>,
) -> ApiResult<UserPermissionsResponse>
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
    S: SharedCacheStore + 'static,
{
    let user_id: UserId = parse_id("user_id", &user_id).map_err(api_error_to_response)?;

    let permissions = state
        .service
        .get_user(&user_id)
        .await
        .map_err(api_error_to_response)?;

    Ok(Json(UserPermissionsResponse {
        user_id,
        permissions,
    }))
}

pub async fn get_application_permissions<D, C, S>(
    State(state): State<AppState<D, C, S>>,
    Path((user_id, application_id)): Path<(String, String)>,
) -> ApiResult<ApplicationPermissionsResponse>
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
    S: SharedCacheStore + 'static,
{
    let user_id: UserId = parse_id("user_id", &user_id).map_err(api_error_to_response)?;
    let application_id: ApplicationId =
        parse_id("application_id", &application_id).map_err(api_error_to_response)?;

    let permissions = state
        .service
        .get_user_by_application(&user_id, &application_id)
        .await
        .map_err(api_error_to_response)?;

    Ok(Json(ApplicationPermissionsResponse {
        user_id,
        application_id,
        permissions,
    }))
}

pub async fn check_global<D, C, S>(
    State(state): State<AppState<D, C, S>>,
    Json(req): Json<CheckGlobalRequest>,
) -> ApiResult<CheckResponse>
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
    S: SharedCacheStore + 'static,
{
    let user_id: UserId = parse_id("user_id", &req.user_id).map_err(api_error_to_response)?;
    let kinds = parse_kinds(&req.permissions).map_err(api_error_to_response)?;

    let allowed = state
        .service
        .authorize_global(&user_id, req.mode, &kinds)
        .await;

    Ok(Json(CheckResponse { allowed }))
}

pub async fn check_application<D, C, S>(
    State(state): State<AppState<D, C, S>>,
    Json(req): Json<CheckApplicationRequest>,
) -> ApiResult<CheckResponse>
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
    S: SharedCacheStore + 'static,
{
    let user_id: UserId = parse_id("user_id", &req.user_id).map_err(api_error_to_response)?;
    let application_id: ApplicationId =
        parse_id("application_id", &req.application_id).map_err(api_error_to_response)?;
    let kinds = parse_kinds(&req.permissions).map_err(api_error_to_response)?;

    let allowed = state
        .service
        .authorize_application(&user_id, &application_id, &kinds)
        .await;

    Ok(Json(CheckResponse { allowed }))
}

pub async fn check_application_legacy<D, C, S>(
    State(state): State<AppState<D, C, S>>,
    Json(req): Json<CheckApplicationRequest>,
) -> ApiResult<CheckResponse>
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
    S: SharedCacheStore + 'static,
{
    let user_id: UserId = parse_id("user_id", &req.user_id).map_err(api_error_to_response)?;
    let application_id: ApplicationId =
        parse_id("application_id", &req.application_id).map_err(api_error_to_response)?;
    let kinds = parse_kinds(&req.permissions).map_err(api_error_to_response)?;

    let allowed = state
        .service
        .authorize_application_legacy(&user_id, &application_id, &kinds)
        .await;

    Ok(Json(CheckResponse { allowed }))
}

pub async fn recalculate_user<D, C, S>(
    State(state): State<AppState<D, C, S>>,
    Path(user_id): Path<String>,
) -> ApiResult<UserRecalculationResponse>
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
    S: SharedCacheStore + 'static,
{
    let user_id: UserId = parse_id("user_id", &user_id).map_err(api_error_to_response)?;

    let effective = state
        .service
        .recalculate_user(&user_id)
        .await
        .map_err(api_error_to_response)?;

    Ok(Json(UserRecalculationResponse {
        user_id,
        global: effective.global,
        applications: effective.applications,
    }))
}

pub async fn recalculate_group<D, C, S>(
    State(state): State<AppState<D, C, S>>,
    Path(group_id): Path<String>,
) -> ApiResult<GroupRecalculationResponse>
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
    S: SharedCacheStore + 'static,
{
    let group_id: GroupId = parse_id("group_id", &group_id).map_err(api_error_to_response)?;

    let outcome = state
        .service
        .recalculate_group(&group_id)
        .await
        .map_err(api_error_to_response)?;

    Ok(Json(GroupRecalculationResponse {
        group_id: outcome.group_id,
        recalculated: outcome.recalculated,
        removed_orphans: outcome.removed_orphans,
    }))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

#[cfg(test)]
mod tests {
    use super::super::{AppState, create_router};
    use crate::metrics::Metrics;
    use crate::service::PermissionService;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use grantwell_core::engine::EngineConfig;
    use grantwell_core::inheritance::InheritanceError;
    use grantwell_core::kind::PermissionKind;
    use grantwell_core::model::{GlobalGrant, Group, GroupId, UserId};
    use grantwell_storage::{InMemoryCacheStore, InMemoryDirectory, MokaSharedCache};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn make_test_server() -> (TestServer, Arc<InMemoryDirectory>, Arc<Metrics>) {
        let directory = Arc::new(InMemoryDirectory::new());
        let metrics = Arc::new(Metrics::new());
        let service = Arc::new(PermissionService::new(
            Arc::clone(&directory),
            Arc::new(InMemoryCacheStore::new()),
            Arc::new(MokaSharedCache::new(1_000, Duration::from_secs(60))),
            EngineConfig::default(),
            Arc::clone(&metrics),
        ));
        let state = AppState {
            service,
            metrics: Arc::clone(&metrics),
        };
        let app = create_router(state);
        (TestServer::new(app).unwrap(), directory, metrics)
    }

    fn seed_admin(dir: &InMemoryDirectory) -> UserId {
        let user = UserId::new(uuid::Uuid::new_v4());
        let group = GroupId::new(uuid::Uuid::new_v4());
        dir.add_user(user);
        dir.upsert_group(Group::new(group, "admins", 5));
        dir.add_membership(group, user);
        dir.set_global_grant(GlobalGrant::allow(group, PermissionKind::Admin));
        user
    }

    #[test]
    fn invalid_input_maps_to_400() {
        let (status, Json(body)) = api_error_to_response(ApiError::InvalidId {
            field: "user_id",
            value: "x".to_string(),
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("user_id"));
    }

    #[test]
    fn inheritance_defect_maps_to_422() {
        let err = ApiError::Engine(grantwell_core::engine::EngineError::Inheritance(
            InheritanceError::DepthExceeded {
                depth: 1,
                path: vec![PermissionKind::Admin, PermissionKind::ManageUsers],
            },
        ));
        let (status, _) = api_error_to_response(err);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn storage_failure_maps_to_500() {
        let err = ApiError::Engine(grantwell_core::engine::EngineError::Cache(
            "timeout".to_string(),
        ));
        let (status, _) = api_error_to_response(err);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn healthz_returns_200() {
        let (server, _, _) = make_test_server();
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_json(&json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn user_permissions_include_inherited_kinds() {
        let (server, dir, _) = make_test_server();
        let user = seed_admin(&dir);

        let response = server.get(&format!("/v1/users/{user}/permissions")).await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        let permissions = body["permissions"].as_array().unwrap();
        assert!(permissions.contains(&json!("admin")));
        assert!(permissions.contains(&json!("view_users")));
    }

    #[tokio::test]
    async fn malformed_user_id_is_400() {
        let (server, _, _) = make_test_server();

        let response = server.get("/v1/users/not-a-uuid/permissions").await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("not-a-uuid"));
    }

    #[tokio::test]
    async fn check_global_defaults_to_any() {
        let (server, dir, _) = make_test_server();
        let user = seed_admin(&dir);

        let response = server
            .post("/v1/permissions/check")
            .json(&json!({
                "user_id": user.to_string(),
                "permissions": ["manage_blog", "view_groups"]
            }))
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({"allowed": true}));
    }

    #[tokio::test]
    async fn check_global_all_mode_requires_every_kind() {
        let (server, dir, _) = make_test_server();
        let user = seed_admin(&dir);

        let response = server
            .post("/v1/permissions/check")
            .json(&json!({
                "user_id": user.to_string(),
                "mode": "all",
                "permissions": ["manage_blog", "view_groups"]
            }))
            .await;

        response.assert_json(&json!({"allowed": false}));
    }

    #[tokio::test]
    async fn unknown_permission_name_is_400() {
        let (server, dir, _) = make_test_server();
        let user = seed_admin(&dir);

        let response = server
            .post("/v1/permissions/check")
            .json(&json!({
                "user_id": user.to_string(),
                "permissions": ["launch_rockets"]
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn middleware_counts_requests() {
        let (server, _, metrics) = make_test_server();

        server.get("/healthz").await;
        server.get("/v1/users/nope/permissions").await;

        assert_eq!(metrics.request_total(), 2);
        assert_eq!(metrics.request_success(), 1);
        assert_eq!(metrics.request_error(), 1);
    }

    #[tokio::test]
    async fn metrics_route_is_served() {
        let (server, _, _) = make_test_server();

        let response = server.get("/metrics").await;

        response.assert_status_ok();
        assert!(response.text().contains("grantwell_requests_total"));
    }
}
