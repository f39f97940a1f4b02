//! Round-robin selection within a cluster.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::backend::{Backend, BackendConnectionGuard};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next backend that still has a free slot.
    pub fn next_guard(&self, backends: &[Arc<Backend>]) -> Option<BackendConnectionGuard> {
        if backends.is_empty() {
            return None;
        }

        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = backends.len();

        (0..len)
            .map(|i| &backends[(start + i) % len])
            .find_map(|backend| backend.try_create_guard())
    }
}
