//! Request-handler decorators and the composer that chains them.
//!
//! A [`Handler`] turns a request into a response. A [`Middleware`] wraps one
//! handler in another and may answer on its own without calling the wrapped
//! handler. [`Chain`] applies an ordered list of middleware around a terminal
//! handler: the first middleware added is the outermost, so it runs its
//! pre-logic first and can stop the request before anything after it sees it.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures::future::BoxFuture;
use tracing::Instrument;

pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request<Body>) -> BoxFuture<'static, Response>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        Box::pin(self(request))
    }
}

pub type SharedHandler = Arc<dyn Handler>;

pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: SharedHandler) -> SharedHandler;
}

#[derive(Clone, Default)]
pub struct Chain {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `middleware`; it runs inside everything added before it.
    pub fn with<M: Middleware>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Compose the chain around `terminal` into a single handler.
    pub fn then<H: Handler>(&self, terminal: H) -> SharedHandler {
        self.middleware
            .iter()
            .rev()
            .fold(Arc::new(terminal) as SharedHandler, |next, m| m.wrap(next))
    }
}

/// Logs method, path, status and latency of every request that reaches it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tracing;

impl Middleware for Tracing {
    fn wrap(&self, next: SharedHandler) -> SharedHandler {
        Arc::new(move |request: Request<Body>| {
            let next = Arc::clone(&next);
            async move {
                let method = request.method().clone();
                let path = request.uri().path().to_owned();
                let span = tracing::info_span!("request", %method, %path);
                let started = Instant::now();

                let response = next.call(request).instrument(span).await;

                tracing::info!(
                    %method,
                    %path,
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "handled request"
                );
                response
            }
        })
    }
}
