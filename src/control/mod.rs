//! Control endpoint: live reconfiguration and liveness.
//!
//! ```text
//! POST /config   body (YAML | JSON | TOML by Content-Type)
//!     → decode → admit → compile → DynamicHandler::replace
//!     → 200 "successfully updated config" | 400 <reason>
//! GET  /healthz  → 200 {"status":"ok"}
//! ```

pub mod handlers;

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::lifecycle::reload::Reloader;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::net::listener::{self, ListenerError};
use self::handlers::*;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("control endpoint failed to bind: {0}")]
    Bind(#[source] ListenerError),

    #[error("control endpoint failed: {0}")]
    Serve(#[source] ListenerError),

    #[error("control endpoint did not drain within {0:?}")]
    DrainTimeout(Duration),

    #[error("control endpoint task panicked: {0}")]
    Panicked(String),
}

pub fn setup_control_router(reloader: Reloader) -> Router {
    Router::new()
        .route("/healthz", get(get_healthz))
        .route("/config", post(post_config))
        .layer(TraceLayer::new_for_http())
        .with_state(reloader)
}

/// A bound control endpoint, not yet accepting.
#[derive(Debug)]
pub struct ControlServer {
    listener: TcpListener,
    router: Router,
}

impl ControlServer {
    pub async fn bind(addr: SocketAddr, reloader: Reloader) -> Result<Self, ControlError> {
        let listener = listener::bind_addr(addr).await.map_err(ControlError::Bind)?;
        Ok(Self {
            listener,
            router: setup_control_router(reloader),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `signal` fires and in-flight requests finish.
    pub async fn serve(self, signal: ShutdownSignal) -> Result<(), ControlError> {
        listener::serve(self.listener, self.router, signal)
            .await
            .map_err(ControlError::Serve)
    }
}
