mod handlers;
pub mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use grantwell_storage::{DirectoryStore, PermissionCacheStore, SharedCacheStore};

const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024; // 1 MB

use crate::metrics::{Metrics, metrics_handler};
use crate::service::PermissionService;

pub struct AppState<D, C, S>
where
    D: DirectoryStore,
    C: PermissionCacheStore,
    S: SharedCacheStore,
{
    pub service: Arc<PermissionService<D, C, S>>,
    pub metrics: Arc<Metrics>,
}

impl<D, C, S> Clone for AppState<D, C, S>
where
    D: DirectoryStore,
    C: PermissionCacheStore,
    S: SharedCacheStore,
{
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

async fn metrics_middleware<D, C, S>(
    State(state): State<AppState<D, C, S>>,
    request: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> Response
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
    S: SharedCacheStore + 'static,
{
    state.metrics.record_request();

    let response = next.run(request).await;

    if response.status().is_success() {
        state.metrics.record_success();
    } else {
        state.metrics.record_error();
    }

    response
}

pub fn create_router<D, C, S>(state: AppState<D, C, S>) -> Router
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
    S: SharedCacheStore + 'static,
{
    let metrics_route = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::clone(&state.metrics));

    Router::new()
        .route(
            "/v1/users/{user_id}/permissions",
            get(handlers::get_user_permissions),
        )
        .route(
            "/v1/users/{user_id}/applications/{application_id}/permissions",
            get(handlers::get_application_permissions),
        )
        .route("/v1/permissions/check", post(handlers::check_global))
        .route(
            "/v1/applications/permissions/check",
            post(handlers::check_application),
        )
        .route(
            "/v1/applications/permissions/check-legacy",
            post(handlers::check_application_legacy),
        )
        .route(
            "/v1/users/{user_id}/recalculate",
            post(handlers::recalculate_user),
        )
        .route(
            "/v1/groups/{group_id}/recalculate",
            post(handlers::recalculate_group),
        )
        .route("/healthz", get(handlers::healthz))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .with_state(state)
        .merge(metrics_route)
}
