//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track in-flight dispatches against it
//! - Enforce max connection limits
//!
//! A [`BackendConnectionGuard`] is the resource a candidate holds while it
//! is being dispatched. Releasing the candidate drops the guard, which
//! gives the slot back.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Configured backend name.
    pub name: String,
    /// Cluster this backend belongs to.
    pub cluster: String,
    /// `host:port` used both to connect and as outbound Host when rewriting.
    pub addr: String,
    /// Maximum concurrent dispatches allowed.
    pub max_connections: usize,
    /// Number of currently held guards.
    pub active_connections: AtomicUsize,
}

impl Backend {
    pub fn new(
        name: impl Into<String>,
        cluster: impl Into<String>,
        addr: impl Into<String>,
        max_connections: usize,
    ) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
            addr: addr.into(),
            max_connections,
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Get the current number of active connections.
    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    fn dec_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Try to create a connection guard that increments count.
    /// Returns `None` once the backend is at `max_connections`.
    pub fn try_create_guard(self: &Arc<Self>) -> Option<BackendConnectionGuard> {
        let mut prev = self.active_connections.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_connections {
                return None;
            }
            match self.active_connections.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(BackendConnectionGuard {
            backend: self.clone(),
        })
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<Backend>,
}

impl BackendConnectionGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.dec_connections();
    }
}
