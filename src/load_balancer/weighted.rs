//! Weighted random load balancing strategy.
//!
//! Weights are folded into cumulative sums at build time. A draw in
//! `[0, total)` selects the first entry whose cumulative sum is strictly
//! greater than the draw, so entry `i` owns `weight[i]` consecutive draws.

use rand::Rng;

use crate::load_balancer::LoadBalancer;

/// Weighted random selector.
#[derive(Debug)]
pub struct Weighted {
    cumulative: Vec<u64>,
}

impl Weighted {
    /// Build from per-upstream weights. Zero weights count as 1.
    pub fn new(weights: impl IntoIterator<Item = u64>) -> Option<Self> {
        let mut total = 0u64;
        let cumulative: Vec<u64> = weights
            .into_iter()
            .map(|weight| {
                total = total.saturating_add(weight.max(1));
                total
            })
            .collect();

        (!cumulative.is_empty()).then_some(Self { cumulative })
    }

    /// Sum of all weights.
    pub fn total(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Index owning `draw`, for `draw` in `[0, total)`.
    pub fn select(&self, draw: u64) -> usize {
        let index = self.cumulative.partition_point(|&sum| sum <= draw);
        index.min(self.cumulative.len() - 1)
    }
}

impl LoadBalancer for Weighted {
    fn next_index(&self) -> usize {
        let draw = rand::thread_rng().gen_range(0..self.total());
        self.select(draw)
    }
}
