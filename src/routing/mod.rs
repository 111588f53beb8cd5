//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → dynamic.rs (load current CompiledChain snapshot)
//!     → router.rs (first matching route, in declaration order)
//!     → matcher.rs (evaluate match conditions)
//!     → load_balancer (pick upstream) → http::proxy (forward)
//!     → or the 404 fallback
//!
//! Route Compilation (at every install):
//!     admitted App
//!     → compiler.rs (resolve sinks, build strategies and matchers)
//!     → CompiledChain, published through DynamicHandler::replace
//! ```
//!
//! # Design Decisions
//! - Compiled chains are immutable once published
//! - Regex patterns are compiled once per chain, never per request
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod compiler;
pub mod dynamic;
pub mod matcher;
pub mod router;

pub use compiler::{compile, CompileError};
pub use dynamic::DynamicHandler;
pub use router::{CompiledChain, CompiledRoute, MatchedRoute};
