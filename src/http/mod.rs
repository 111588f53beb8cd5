//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::listener)
//!     → middleware (access log, outermost)
//!     → server.rs (Axum setup, request ID, timeout)
//!     → request.rs (add request ID)
//!     → routing::DynamicHandler (match route, pick upstream)
//!     → proxy.rs (rewrite target, forward with the shared client)
//!     → response.rs (gateway-generated 404 / 502)
//!     → Send to client
//! ```

pub mod middleware;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::{ProxyError, Transport};
pub use request::X_REQUEST_ID;
pub use server::worker_router;
