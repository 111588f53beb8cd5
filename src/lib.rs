//! sinkplot: a hot-reloadable HTTP reverse proxy.
//!
//! An application declares listener ports, routes and sinks (named upstream
//! groups). Every listener serves the same compiled routing table; the table
//! is replaced atomically whenever a new configuration is admitted through
//! the control endpoint or the watched config file.

// Configuration and its admission
pub mod admission;
pub mod config;

// Data plane
pub mod http;
pub mod load_balancer;
pub mod net;
pub mod routing;

// Control plane and cross-cutting concerns
pub mod control;
pub mod lifecycle;
pub mod observability;

pub use config::schema::Config;
pub use lifecycle::{Manager, ManagerOptions, Shutdown};
pub use routing::DynamicHandler;
