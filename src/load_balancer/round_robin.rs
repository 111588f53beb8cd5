//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::LoadBalancer;

/// Round-robin selector.
/// Stores an internal counter to rotate through upstreams in declaration order.
#[derive(Debug)]
pub struct RoundRobin {
    counter: AtomicUsize,
    len: usize,
}

impl RoundRobin {
    pub fn new(len: usize) -> Option<Self> {
        (len > 0).then_some(Self {
            counter: AtomicUsize::new(0),
            len,
        })
    }
}

impl LoadBalancer for RoundRobin {
    fn next_index(&self) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed) % self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new(2).unwrap();

        assert_eq!(lb.next_index(), 0);
        assert_eq!(lb.next_index(), 1);
        assert_eq!(lb.next_index(), 0);
    }

    #[test]
    fn test_round_robin_shared_across_threads() {
        let lb = std::sync::Arc::new(RoundRobin::new(3).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lb = lb.clone();
                std::thread::spawn(move || {
                    let mut counts = [0usize; 3];
                    for _ in 0..300 {
                        counts[lb.next_index()] += 1;
                    }
                    counts
                })
            })
            .collect();

        let mut totals = [0usize; 3];
        for handle in handles {
            for (total, n) in totals.iter_mut().zip(handle.join().unwrap()) {
                *total += n;
            }
        }
        assert_eq!(totals, [400, 400, 400]);
    }
}
