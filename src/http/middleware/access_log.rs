//! Access log and request metrics.
//!
//! Installed as the outermost layer of the worker router, so every response
//! is recorded, including the ones produced by inner layers (timeouts).

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::routing::MatchedRoute;

/// Route label for responses no route produced, such as a timeout.
pub const UNROUTED: &str = "unknown";

pub async fn access_log(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    // The request-id layers sit inside this one; the id is echoed on the response.
    let request_id = response
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");
    let route = response
        .extensions()
        .get::<MatchedRoute>()
        .map_or(UNROUTED, MatchedRoute::as_str);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status,
        route = %route,
        duration_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    metrics::record_request(method.as_str(), status, route, start);

    response
}
