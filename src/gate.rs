//! Field-level authorization in front of the GraphQL engine.
//!
//! For every request the gate reads the body once, pulls the `query` text out
//! of it, and asks the [`PolicyStore`] about each top-level field of each
//! query or mutation operation. The first field the caller may not touch ends
//! the request with `403 {"error":"Forbidden"}`. Otherwise the buffered body
//! is put back on the request and the next handler runs as if nothing had
//! read it.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::authz::{Action, PolicyStore};
use crate::inspect::{inspect, InspectError, ParsedQuery};
use crate::middleware::{Handler, Middleware, SharedHandler};

pub const DEFAULT_SUBJECT_HEADER: &str = "x-subject";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error, Diagnostic)]
pub enum GateError {
    #[error("subject `{subject}` is not allowed to {action} field `{field}`")]
    #[diagnostic(code(fieldgate::gate::forbidden))]
    Forbidden {
        subject: String,
        field: String,
        action: Action,
    },

    #[error("invalid GraphQL query: {0}")]
    #[diagnostic(code(fieldgate::gate::query))]
    Query(#[from] InspectError),

    #[error("failed to read request body: {0}")]
    #[diagnostic(code(fieldgate::gate::body_read))]
    BodyRead(String),
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        match self {
            GateError::Forbidden { .. } => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": "Forbidden" }))).into_response()
            }
            GateError::Query(_) | GateError::BodyRead(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
        }
    }
}

/// One GraphQL-over-HTTP request body. Only `query` matters here.
#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Single(QueryBody),
    Batch(Vec<QueryBody>),
}

/// Query texts carried by `body`, in order. Bodies that are not GraphQL JSON
/// carry none; rejecting them is the engine's job.
fn query_texts(body: &[u8]) -> Vec<String> {
    if body.is_empty() {
        return Vec::new();
    }
    match serde_json::from_slice::<Payload>(body) {
        Ok(Payload::Single(b)) => b.query.into_iter().collect(),
        Ok(Payload::Batch(items)) => items.into_iter().filter_map(|b| b.query).collect(),
        Err(e) => {
            tracing::debug!(error = %e, "request body is not a GraphQL JSON payload");
            Vec::new()
        }
    }
}

/// Caller identity as asserted by an upstream authenticator. Missing or
/// non-UTF-8 values mean anonymous, i.e. the empty subject.
fn subject_from(headers: &HeaderMap, header: &HeaderName) -> String {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[derive(Clone)]
pub struct AuthorizationGate {
    store: Arc<PolicyStore>,
    subject_header: HeaderName,
    max_body_bytes: usize,
}

impl AuthorizationGate {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self {
            store,
            subject_header: HeaderName::from_static(DEFAULT_SUBJECT_HEADER),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_subject_header(mut self, header: HeaderName) -> Self {
        self.subject_header = header;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Check every field of `parsed` for `subject`, stopping at the first
    /// denial.
    pub fn check(&self, subject: &str, parsed: &ParsedQuery) -> Result<(), GateError> {
        for (field, action) in parsed.checks() {
            if !self.store.is_authorized(subject, field, action) {
                tracing::debug!(subject, field, %action, "field access denied");
                return Err(GateError::Forbidden {
                    subject: subject.to_string(),
                    field: field.to_string(),
                    action,
                });
            }
        }
        Ok(())
    }

    /// Authorize `request`. On success returns it with its body restored.
    pub async fn authorize(&self, request: Request<Body>) -> Result<Request<Body>, GateError> {
        let (parts, body) = request.into_parts();
        let bytes: Bytes = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| GateError::BodyRead(e.to_string()))?;

        let subject = subject_from(&parts.headers, &self.subject_header);

        for text in query_texts(&bytes) {
            let parsed = inspect(&text)?;
            self.check(&subject, &parsed)?;
        }

        Ok(Request::from_parts(parts, Body::from(bytes)))
    }
}

impl Middleware for AuthorizationGate {
    fn wrap(&self, next: SharedHandler) -> SharedHandler {
        let gate = self.clone();
        Arc::new(move |request: Request<Body>| {
            let gate = gate.clone();
            let next = Arc::clone(&next);
            async move {
                match gate.authorize(request).await {
                    Ok(request) => next.call(request).await,
                    Err(e) => {
                        if !matches!(e, GateError::Forbidden { .. }) {
                            tracing::warn!(error = %e, "rejecting GraphQL request");
                        }
                        e.into_response()
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_with(grants: &[(&str, &str, Action)]) -> AuthorizationGate {
        let store = Arc::new(PolicyStore::new());
        for (subject, resource, action) in grants {
            store.add_permission(subject, resource, *action);
        }
        AuthorizationGate::new(store)
    }

    fn request(subject: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/graphql");
        if let Some(subject) = subject {
            builder = builder.header("X-Subject", subject);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[test]
    fn test_check_reports_first_denied_field() {
        let gate = gate_with(&[("alice", "b", Action::Query)]);
        let parsed = inspect("{ a b c }").unwrap();
        let err = gate.check("alice", &parsed).unwrap_err();
        assert!(matches!(err, GateError::Forbidden { ref field, .. } if field == "a"));

        let gate = gate_with(&[("alice", "a", Action::Query)]);
        let err = gate.check("alice", &parsed).unwrap_err();
        assert!(matches!(err, GateError::Forbidden { ref field, .. } if field == "b"));
    }

    #[test]
    fn test_check_uses_operation_action() {
        let gate = gate_with(&[("bob", "fee", Action::Query)]);
        let parsed = inspect("mutation { fee }").unwrap();
        let err = gate.check("bob", &parsed).unwrap_err();
        assert!(matches!(
            err,
            GateError::Forbidden {
                action: Action::Mutation,
                ..
            }
        ));
    }

    #[test]
    fn test_query_texts() {
        assert_eq!(query_texts(br#"{"query":"{ foo }"}"#), vec!["{ foo }"]);
        assert_eq!(
            query_texts(br#"[{"query":"{ a }"},{"variables":{}},{"query":"{ b }"}]"#),
            vec!["{ a }", "{ b }"]
        );
        assert!(query_texts(br#"{"operationName":"x"}"#).is_empty());
        assert!(query_texts(br#"{"query":null}"#).is_empty());
        assert!(query_texts(b"not json").is_empty());
        assert!(query_texts(b"").is_empty());
    }

    #[test]
    fn test_subject_defaults_to_anonymous() {
        let header = HeaderName::from_static(DEFAULT_SUBJECT_HEADER);
        let mut headers = HeaderMap::new();
        assert_eq!(subject_from(&headers, &header), "");

        headers.insert("x-subject", "alice".parse().unwrap());
        assert_eq!(subject_from(&headers, &header), "alice");
    }

    #[tokio::test]
    async fn test_authorize_restores_body() {
        let gate = gate_with(&[("alice", "foo", Action::Query)]);
        let body = r#"{"query":"query { foo }","variables":{"x":1}}"#;

        let restored = gate.authorize(request(Some("alice"), body)).await.unwrap();
        let bytes = axum::body::to_bytes(restored.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes, body.as_bytes());
    }

    #[tokio::test]
    async fn test_authorize_anonymous_is_denied() {
        let gate = gate_with(&[("alice", "foo", Action::Query)]);
        let err = gate
            .authorize(request(None, r#"{"query":"{ foo }"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Forbidden { ref subject, .. } if subject.is_empty()));
    }

    #[tokio::test]
    async fn test_authorize_rejects_unparseable_query() {
        let gate = gate_with(&[]);
        let err = gate
            .authorize(request(Some("alice"), r#"{"query":"query {"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Query(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_authorize_rejects_oversized_body() {
        let gate = gate_with(&[]).with_max_body_bytes(8);
        let err = gate
            .authorize(request(Some("alice"), r#"{"query":"{ foo }"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::BodyRead(_)));
    }

    #[tokio::test]
    async fn test_custom_subject_header() {
        let store = Arc::new(PolicyStore::new());
        store.add_permission("alice", "foo", Action::Query);
        let gate = AuthorizationGate::new(store)
            .with_subject_header(HeaderName::from_static("x-user"));

        let req = Request::builder()
            .method("POST")
            .header("X-User", "alice")
            .body(Body::from(r#"{"query":"{ foo }"}"#))
            .unwrap();
        assert!(gate.authorize(req).await.is_ok());

        // The default header is no longer consulted.
        let err = gate
            .authorize(request(Some("alice"), r#"{"query":"{ foo }"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Forbidden { .. }));
    }

    #[test]
    fn test_forbidden_response_shape() {
        let err = GateError::Forbidden {
            subject: "bob".into(),
            field: "foo".into(),
            action: Action::Query,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
    }
}
