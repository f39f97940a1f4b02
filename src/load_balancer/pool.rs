//! Backend pool management.
//!
//! # Responsibilities
//! - Manage collections of backends grouped by cluster
//! - Hand out connection guards for the next backend of a cluster

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::load_balancer::{
    backend::{Backend, BackendConnectionGuard},
    round_robin::RoundRobin,
};

/// Manages backend pools per cluster.
#[derive(Debug, Default)]
pub struct BackendManager {
    clusters: HashMap<String, (Vec<Arc<Backend>>, RoundRobin)>,
}

impl BackendManager {
    /// Create a new backend manager from configuration.
    pub fn new(configs: &[BackendConfig]) -> Self {
        let mut clusters: HashMap<String, (Vec<Arc<Backend>>, RoundRobin)> = HashMap::new();

        for config in configs {
            let backend = Arc::new(Backend::new(
                config.name.clone(),
                config.cluster.clone(),
                config.address.clone(),
                config.max_connections,
            ));
            clusters
                .entry(config.cluster.clone())
                .or_insert_with(|| (Vec::new(), RoundRobin::new()))
                .0
                .push(backend);
        }

        Self { clusters }
    }

    /// Select a backend for the given cluster.
    /// Returns a guard that decrements the connection count on drop.
    pub fn get(&self, cluster: &str) -> Option<BackendConnectionGuard> {
        let Some((backends, lb)) = self.clusters.get(cluster) else {
            tracing::debug!(cluster = %cluster, "Cluster not found in BackendManager");
            return None;
        };

        let guard = lb.next_guard(backends);
        if guard.is_none() {
            tracing::debug!(
                cluster = %cluster,
                backend_count = backends.len(),
                "No backend with free capacity in cluster"
            );
        }
        guard
    }

    /// Return a list of all backends.
    pub fn all_backends(&self) -> Vec<Arc<Backend>> {
        let mut all: Vec<Arc<Backend>> = self
            .clusters
            .values()
            .flat_map(|(backends, _)| backends.iter())
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn has_cluster(&self, cluster: &str) -> bool {
        self.clusters.contains_key(cluster)
    }
}
