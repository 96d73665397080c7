use async_graphql::{EmptySubscription, Object, Schema};
use async_graphql_axum::GraphQLResponse;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::middleware::Handler;

pub struct QueryRoot;

#[Object(name = "RootQuery")]
impl QueryRoot {
    async fn foo(&self) -> String {
        "bar".to_string()
    }
}

pub struct MutationRoot;

#[Object(name = "RootMutation")]
impl MutationRoot {
    async fn fee(&self) -> String {
        "baz".to_string()
    }
}

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema() -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription).finish()
}

/// Terminal handler that executes a JSON GraphQL request against `schema`.
///
/// Only `application/json` style bodies are accepted, so every query it runs
/// is one the gate was able to see.
pub fn executor(schema: AppSchema) -> impl Handler {
    move |request: Request<Body>| {
        let schema = schema.clone();
        async move { execute(&schema, request).await }
    }
}

async fn execute(schema: &AppSchema, request: Request<Body>) -> Response {
    let bytes = match axum::body::to_bytes(request.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => return bad_request(e.to_string()),
    };
    // A single object or a JSON array of them.
    let batch: async_graphql::BatchRequest = match serde_json::from_slice(&bytes) {
        Ok(batch) => batch,
        Err(e) => return bad_request(format!("invalid GraphQL request body: {e}")),
    };
    GraphQLResponse::from(schema.execute_batch(batch).await).into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// GraphiQL playground handler
pub async fn playground() -> impl IntoResponse {
    Html(
        async_graphql::http::GraphiQLSource::build()
            .endpoint("/graphql")
            .finish(),
    )
}
