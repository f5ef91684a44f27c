//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: health probe plus document lookup by path
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve on a bound listener until shutdown
//!
//! # Design Decisions
//! - Handlers only read the published snapshot; they never touch the provider
//! - Every path other than `/healthz` is a document lookup, any method

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::validation::HEALTH_PATH;
use crate::discovery::DocumentStore;
use crate::http::request::UuidRequestId;
use crate::http::response;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
}

/// HTTP surface serving discovery documents.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server reading from `store`.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self::with_timeout(store, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(store: Arc<DocumentStore>, request_timeout: Duration) -> Self {
        let router = Self::build_router(AppState { store }, request_timeout);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route(HEALTH_PATH, get(healthz))
            .fallback(serve_document)
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The configured router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until a shutdown notice arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Look up the request path in the published documents.
async fn serve_document(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri.path();
    let rendered = state.store.with_document(path, |groups| {
        tracing::debug!(path = %path, groups = groups.len(), "Serving SD document");
        response::sd_document(groups)
    });
    rendered.unwrap_or_else(|| {
        tracing::debug!(path = %path, "Unknown SD path");
        response::not_found()
    })
}
