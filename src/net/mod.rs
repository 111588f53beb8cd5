//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Listener ports (from the admitted app)
//!     → worker_group.rs (bind all, all-or-nothing)
//!     → listener.rs (axum accept/serve loop per port)
//!     → tracker.rs (liveness, for bounded drain)
//!     → Hand off to HTTP layer
//!
//! Listener States:
//!     Bound → Accepting → Draining → Stopped (or Aborted past the deadline)
//! ```
//!
//! # Design Decisions
//! - A bind failure on any port is fatal to the whole group
//! - Each serve task tracked for graceful shutdown

pub mod listener;
pub mod tracker;
pub mod worker_group;

pub use listener::ListenerError;
pub use worker_group::{WorkerError, WorkerGroup, WorkerGroupError};
