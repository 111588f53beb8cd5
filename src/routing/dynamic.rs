//! Hot-swappable routing table.
//!
//! Every listener dispatches through one [`DynamicHandler`]. A request loads
//! the current chain once and is served entirely against that snapshot, so a
//! concurrent swap never mixes two generations within one request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Request, Response};

use crate::routing::router::CompiledChain;

#[derive(Debug)]
pub struct DynamicHandler {
    current: ArcSwap<CompiledChain>,
    generation: AtomicU64,
    // Serializes writers so generations are published in order.
    writer: Mutex<()>,
}

impl DynamicHandler {
    pub fn new(initial: CompiledChain) -> Self {
        let generation = initial.generation();
        Self {
            current: ArcSwap::from_pointee(initial),
            generation: AtomicU64::new(generation),
            writer: Mutex::new(()),
        }
    }

    /// Current chain. Holding the returned `Arc` keeps that generation alive.
    pub fn snapshot(&self) -> Arc<CompiledChain> {
        self.current.load_full()
    }

    /// Generation of the chain currently published.
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Publish `chain`, returning the generation it was stamped with.
    pub fn replace(&self, mut chain: CompiledChain) -> u64 {
        let _guard = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        chain.set_generation(generation);
        self.current.store(Arc::new(chain));
        generation
    }

    /// Serve one request against the chain current at call time.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let chain = self.snapshot();
        chain.handle(req).await
    }
}
