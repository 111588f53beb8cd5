//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON/YAML/TOML) or control-plane body
//!     → loader.rs (decode into Config)
//!     → admission (defaults + validation)
//!     → routing::compiler (CompiledChain)
//!
//! With --watch:
//!     watcher.rs detects change
//!     → loader.rs decodes the file
//!     → the reloader admits, compiles and installs it
//! ```
//!
//! # Design Decisions
//! - Raw config is discarded after compilation; only the compiled chain lives on
//! - Unknown tokens are kept as strings so admission can name them in errors

pub mod loader;
pub mod schema;
pub mod watcher;

pub use loader::{load_config, ConfigFormat, LoadError};
pub use schema::{App, Config, MatchKind, Route, Sink, StrategyKind, Upstream};
