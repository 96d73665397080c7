//! HTTP surface: the gated `/graphql` endpoint, static files, and the optional
//! policy check listener.
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Request};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tower_http::services::ServeDir;

use crate::authz::PolicyStore;
use crate::errors::AppError;
use crate::gate::AuthorizationGate;
use crate::graphql::{self, AppSchema};
use crate::middleware::{Chain, Handler, Tracing};
use crate::settings::Settings;

// Security headers middleware
async fn security_headers(request: Request<Body>, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );

    response
}

/// The gate, configured from `settings`.
pub fn build_gate(
    settings: &Settings,
    store: Arc<PolicyStore>,
) -> Result<AuthorizationGate, AppError> {
    let header = HeaderName::try_from(settings.gate.subject_header.to_ascii_lowercase())
        .map_err(|_| AppError::InvalidHeader(settings.gate.subject_header.clone()))?;
    Ok(AuthorizationGate::new(store)
        .with_subject_header(header)
        .with_max_body_bytes(settings.gate.max_body_bytes))
}

pub fn build_router(
    settings: &Settings,
    store: Arc<PolicyStore>,
    schema: AppSchema,
) -> Result<Router, AppError> {
    let chain = Chain::new().with(build_gate(settings, store)?).with(Tracing);
    let handler = chain.then(graphql::executor(schema));

    let router = Router::new()
        .route(
            "/graphql",
            post(move |request: Request<Body>| handler.call(request)).get(graphql::playground),
        )
        .fallback_service(ServeDir::new(&settings.server.static_dir))
        .layer(middleware::from_fn(security_headers));

    Ok(router)
}

fn listen_addr(host: &str, port: u16) -> Result<SocketAddr, AppError> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| AppError::Addr(format!("{host}:{port}: {e}")))
}

pub async fn serve(
    settings: Settings,
    store: Arc<PolicyStore>,
    schema: AppSchema,
) -> Result<(), AppError> {
    let router = build_router(&settings, Arc::clone(&store), schema)?;
    let public_addr = listen_addr(&settings.server.host, settings.server.port)?;

    // Start policy check server (if enabled)
    if settings.authz.api_enabled {
        let api_addr = listen_addr(&settings.server.host, settings.api_port()?)?;
        let api_router = crate::authz::web::router(Arc::clone(&store));
        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        tracing::info!(%api_addr, "Policy check API listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(api_listener, api_router).await {
                tracing::error!(error = %e, "Policy check API server failed");
            }
        });
    }

    tracing::info!(
        %public_addr,
        subject_header = %settings.gate.subject_header,
        "GraphQL endpoint listening on /graphql"
    );
    let listener = tokio::net::TcpListener::bind(public_addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
