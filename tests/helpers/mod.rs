use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use fieldgate::authz::{Action, PolicyStore};
use fieldgate::graphql::build_schema;
use fieldgate::settings::Settings;
use fieldgate::web::build_router;

/// Store seeded with `(subject, resource, action)` grants.
pub fn store_with(grants: &[(&str, &str, Action)]) -> Arc<PolicyStore> {
    let store = Arc::new(PolicyStore::new());
    for (subject, resource, action) in grants {
        store.add_permission(subject, resource, *action);
    }
    store
}

/// Full application router over `store`, with default settings.
pub fn app(store: Arc<PolicyStore>) -> Router {
    build_router(&Settings::default(), store, build_schema()).expect("router")
}

/// `POST /graphql` with a JSON body carrying `query`.
pub fn graphql_request(subject: Option<&str>, query: &str) -> Request<Body> {
    raw_request(subject, serde_json::json!({ "query": query }).to_string())
}

pub fn raw_request(subject: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/graphql")
        .header("content-type", "application/json");
    if let Some(subject) = subject {
        builder = builder.header("X-Subject", subject);
    }
    builder.body(Body::from(body)).expect("request")
}

/// Send `request` through `app` and return status, content type and body.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, content_type, bytes.to_vec())
}

pub fn json(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).expect("json")
}
