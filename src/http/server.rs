//! Data-plane HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router every worker listener serves
//! - Wire up middleware (access log, request ID, timeout)
//! - Dispatch every request into the shared dynamic handler
//!
//! # Design Decisions
//! - No static routes: matching happens in the compiled chain, so the
//!   router is a single fallback service
//! - The access log is the outermost layer so timeouts are recorded too
//! - The same router value is cloned into every listener; routing changes
//!   never rebuild it

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::Response,
    Router,
};
use tower_http::timeout::TimeoutLayer;

use crate::http::middleware::access_log;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::routing::DynamicHandler;

/// Build the router served on every worker listener.
#[allow(deprecated)]
pub fn worker_router(handler: Arc<DynamicHandler>, request_timeout: Duration) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .with_state(handler)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
        .layer(middleware::from_fn(access_log))
}

/// Main proxy handler.
async fn proxy_handler(
    State(handler): State<Arc<DynamicHandler>>,
    request: Request<Body>,
) -> Response {
    handler.handle(request).await
}
