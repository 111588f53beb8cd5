//! Uniform random load balancing strategy.

use rand::Rng;

use crate::load_balancer::LoadBalancer;

/// Uniform random selector.
#[derive(Debug)]
pub struct Random {
    len: usize,
}

impl Random {
    pub fn new(len: usize) -> Option<Self> {
        (len > 0).then_some(Self { len })
    }
}

impl LoadBalancer for Random {
    fn next_index(&self) -> usize {
        rand::thread_rng().gen_range(0..self.len)
    }
}
