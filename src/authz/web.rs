use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::authz::store::PolicyStore;
use crate::authz::types::{CheckRequest, CheckResponse};

pub fn router(store: Arc<PolicyStore>) -> Router {
    Router::new()
        .route("/v1/check", post(handle_check))
        .route("/healthz", get(health))
        .with_state(store)
}

async fn handle_check(
    State(store): State<Arc<PolicyStore>>,
    Json(req): Json<CheckRequest>,
) -> impl IntoResponse {
    let allowed = store.is_authorized(&req.subject, &req.resource, req.action);
    Json(CheckResponse { allowed })
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
