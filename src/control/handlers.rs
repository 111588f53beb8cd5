use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::loader::ConfigFormat;
use crate::lifecycle::reload::Reloader;

pub const UPDATED_BODY: &str = "successfully updated config\n";

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

pub async fn get_healthz() -> Json<HealthStatus> {
    Json(HealthStatus { status: "ok" })
}

/// Decode, admit, compile and install a configuration.
pub async fn post_config(
    State(reloader): State<Reloader>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let format = ConfigFormat::from_content_type(content_type);

    let config = match format.parse(&body) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, ?format, "Rejected config update body");
            return (StatusCode::BAD_REQUEST, format!("{e}\n")).into_response();
        }
    };

    match reloader.install(config) {
        Ok(generation) => {
            tracing::info!(generation, "Config updated via control endpoint");
            (StatusCode::OK, UPDATED_BODY).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, format!("{e}\n")).into_response(),
    }
}
