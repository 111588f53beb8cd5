//! Gateway-generated responses.
//!
//! Upstream responses are relayed untouched; these are the only bodies the
//! gateway writes itself on the data plane.

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;

/// Body of the fallback response when no route matches.
pub const NO_ROUTE_BODY: &str = "No matching route found";

/// Body of the response when the chosen upstream could not be reached.
pub const BAD_GATEWAY_BODY: &str = "Upstream request failed";

pub fn not_found() -> Response<Body> {
    (StatusCode::NOT_FOUND, NO_ROUTE_BODY).into_response()
}

pub fn bad_gateway() -> Response<Body> {
    (StatusCode::BAD_GATEWAY, BAD_GATEWAY_BODY).into_response()
}
