//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (manager.rs):
//!     Install boot config (reload.rs) → Bind control → Bind workers → Serve
//!
//! Reload (reload.rs):
//!     Control POST / file watcher → admit → compile → DynamicHandler::replace
//!
//! Shutdown (shutdown.rs, manager.rs):
//!     Trigger → Stop accepting → Drain (bounded) → Abort stragglers → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then control, then listeners
//! - Shutdown has a deadline per component; overruns are reported, not hidden

pub mod manager;
pub mod reload;
pub mod shutdown;
pub mod signals;

pub use manager::{Manager, ManagerError, ManagerOptions, ManagerState, ShutdownError};
pub use reload::{ReloadError, Reloader};
pub use shutdown::{Shutdown, ShutdownSignal};
