//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Sink (compiled once per routing table)
//!     → Strategy::build renders "host:port" for every upstream
//!     → Apply load balancing algorithm:
//!         - random.rs (uniform draw)
//!         - weighted.rs (cumulative weights + binary search)
//!         - round_robin.rs (rotate through upstreams)
//!     → Strategy::pick returns the address to forward to
//! ```
//!
//! # Design Decisions
//! - Addresses are rendered once at compile time, never per request
//! - A strategy is never built for an empty upstream list
//! - Strategies are immutable after construction (round-robin cursor aside)

pub mod random;
pub mod round_robin;
pub mod weighted;

use std::fmt;

use crate::config::schema::{StrategyKind, Upstream};

pub use random::Random;
pub use round_robin::RoundRobin;
pub use weighted::Weighted;

/// Selection algorithm over a fixed, non-empty list of upstreams.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Index of the next upstream. Always less than the list length the
    /// balancer was built for.
    fn next_index(&self) -> usize;
}

/// A sink's upstream addresses paired with the algorithm choosing among them.
#[derive(Debug)]
pub struct Strategy {
    kind: StrategyKind,
    addresses: Vec<String>,
    balancer: Box<dyn LoadBalancer>,
}

impl Strategy {
    /// Build a strategy for the given upstreams. Returns `None` when there
    /// are no upstreams to choose from.
    pub fn build(kind: StrategyKind, upstreams: &[Upstream]) -> Option<Self> {
        if upstreams.is_empty() {
            return None;
        }

        let addresses: Vec<String> = upstreams.iter().map(Upstream::authority).collect();
        let balancer: Box<dyn LoadBalancer> = match kind {
            StrategyKind::Random => Box::new(Random::new(addresses.len())?),
            StrategyKind::Weighted => Box::new(Weighted::new(
                upstreams.iter().map(Upstream::effective_weight),
            )?),
            StrategyKind::RoundRobin => Box::new(RoundRobin::new(addresses.len())?),
        };

        Some(Self {
            kind,
            addresses,
            balancer,
        })
    }

    /// Choose the upstream for one request.
    pub fn pick(&self) -> &str {
        &self.addresses[self.balancer.next_index()]
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Every address this strategy can return, in declaration order.
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }
}
