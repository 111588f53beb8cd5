//! TCP listener binding and serving.
//!
//! # Responsibilities
//! - Bind to configured address(es)
//! - Serve an Axum router until the shutdown signal fires
//! - Drain in-flight requests before returning
//!
//! # Design Decisions
//! - Binding and serving are separate steps so a group of listeners can be
//!   bound all-or-nothing before any of them accepts traffic

use std::net::{IpAddr, SocketAddr};

use axum::Router;
use tokio::net::TcpListener;

use crate::lifecycle::shutdown::ShutdownSignal;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The accept/serve loop failed.
    #[error("failed to serve on {addr}: {source}")]
    Serve {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Bind `host:port`.
pub async fn bind(host: IpAddr, port: u16) -> Result<TcpListener, ListenerError> {
    bind_addr(SocketAddr::new(host, port)).await
}

/// Bind an explicit socket address.
pub async fn bind_addr(addr: SocketAddr) -> Result<TcpListener, ListenerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| ListenerError::Bind { addr, source })?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}

/// Serve `router` on `listener` until `signal` fires and open connections
/// have finished.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    signal: ShutdownSignal,
) -> Result<(), ListenerError> {
    let addr = listener
        .local_addr()
        .map_err(|source| ListenerError::Serve {
            addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            source,
        })?;

    tracing::info!(address = %addr, "Listener accepting");

    axum::serve(listener, router)
        .with_graceful_shutdown(signal.wait())
        .await
        .map_err(|source| ListenerError::Serve { addr, source })?;

    tracing::info!(address = %addr, "Listener stopped");
    Ok(())
}
