//! Liveness tracking for serve tasks.
//!
//! # Responsibilities
//! - Count serve tasks that have not finished draining
//! - Let shutdown wait until the count reaches zero
//!
//! # Design Decisions
//! - Guards decrement on drop, so a panicking or aborted task still
//!   releases its slot
//! - Waiting is event-driven through a watch channel, no polling

use std::sync::Arc;

use tokio::sync::watch;

/// Counts live serve tasks.
#[derive(Debug, Clone)]
pub struct ServeTracker {
    active: Arc<watch::Sender<usize>>,
}

impl ServeTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new live task. Returns a guard that decrements on drop.
    pub fn track(&self) -> ServeGuard {
        self.active.send_modify(|count| *count += 1);
        ServeGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active_count(&self) -> usize {
        *self.active.borrow()
    }

    /// Resolve once no tracked task is alive.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

impl Default for ServeTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a serve task's lifetime.
#[derive(Debug)]
pub struct ServeGuard {
    active: Arc<watch::Sender<usize>>,
}

impl Drop for ServeGuard {
    fn drop(&mut self) {
        self.active
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}
