//! Route table: the resolver used by the gateway.
//!
//! # Responsibilities
//! - Store compiled routes, highest priority first
//! - Turn the first matching route into one candidate per target
//! - Pick each target's backend from its cluster
//! - Compute rewrite decisions from target templates
//!
//! # Design Decisions
//! - Immutable after construction; reloads build a new table
//! - A cluster without free capacity yields a candidate without a server
//! - No match yields no candidates

use std::sync::Arc;

use crate::config::{GatewayConfig, RouteConfig, TargetConfig};
use crate::http::InboundRequest;
use crate::load_balancer::BackendManager;
use crate::proxy::{Candidate, Resolver, Rewrite};
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub priority: u32,
    pub targets: Vec<TargetConfig>,
    matcher: AndMatcher,
}

impl Route {
    fn compile(config: &RouteConfig) -> Self {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &config.host {
            matchers.push(Box::new(HostMatcher::new(host.clone())));
        }
        if let Some(prefix) = &config.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
        }

        Self {
            name: config.name.clone(),
            priority: config.priority,
            targets: config.targets.clone(),
            matcher: AndMatcher::new(matchers),
        }
    }

    pub fn matches(&self, req: &InboundRequest) -> bool {
        self.matcher.matches(req)
    }
}

/// Immutable routing snapshot.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    backends: Arc<BackendManager>,
}

impl RouteTable {
    pub fn new(routes: &[RouteConfig], backends: Arc<BackendManager>) -> Self {
        let mut routes: Vec<Route> = routes.iter().map(Route::compile).collect();
        // Stable sort: equal priorities keep configuration order.
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { routes, backends }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(&config.routes, Arc::new(BackendManager::new(&config.backends)))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn backends(&self) -> &Arc<BackendManager> {
        &self.backends
    }

    pub fn match_request(&self, req: &InboundRequest) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(req))
    }

    fn candidate(&self, req: &InboundRequest, target: &TargetConfig) -> Candidate {
        let mut candidate = Candidate::new(target.attribution.clone(), self.backends.get(&target.cluster));
        if let Some(path) = &target.path {
            candidate = candidate.with_target_path(path.clone());
        }
        if let Some(template) = &target.rewrite {
            candidate = candidate.with_rewrite(Rewrite::to(expand_rewrite(template, req)));
        }
        candidate
    }
}

impl Resolver for RouteTable {
    fn select(&self, inbound: &InboundRequest) -> Vec<Candidate> {
        let Some(route) = self.match_request(inbound) else {
            tracing::debug!(path = %inbound.path(), "No route matched");
            return Vec::new();
        };

        tracing::debug!(route = %route.name, targets = route.targets.len(), "Route matched");
        route
            .targets
            .iter()
            .map(|target| self.candidate(inbound, target))
            .collect()
    }
}

/// Fill `{path}` and `{query}` into a rewrite template.
///
/// Placeholders are substituted in one pass, so braces inside the inbound
/// path or query are copied literally. A template ending in a dangling `?`
/// (empty query) has it trimmed.
pub fn expand_rewrite(template: &str, req: &InboundRequest) -> String {
    const PATH: &str = "{path}";
    const QUERY: &str = "{query}";

    let mut expanded =
        String::with_capacity(template.len() + req.path().len() + req.query().map_or(0, str::len));
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        expanded.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix(PATH) {
            expanded.push_str(req.path());
            rest = after;
        } else if let Some(after) = tail.strip_prefix(QUERY) {
            expanded.push_str(req.query().unwrap_or(""));
            rest = after;
        } else {
            expanded.push('{');
            rest = &tail[1..];
        }
    }
    expanded.push_str(rest);

    if expanded.ends_with('?') {
        expanded.pop();
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::proxy::testing::inbound_with;

    fn target(attribution: &str, cluster: &str) -> TargetConfig {
        TargetConfig {
            attribution: attribution.into(),
            cluster: cluster.into(),
            path: None,
            rewrite: None,
        }
    }

    fn route(name: &str, prefix: &str, priority: u32, targets: Vec<TargetConfig>) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            host: None,
            path_prefix: Some(prefix.into()),
            priority,
            targets,
        }
    }

    fn table(routes: Vec<RouteConfig>) -> RouteTable {
        let backends = vec![
            BackendConfig {
                name: "u1".into(),
                cluster: "users".into(),
                address: "127.0.0.1:3001".into(),
                max_connections: 1,
            },
            BackendConfig {
                name: "o1".into(),
                cluster: "orders".into(),
                address: "127.0.0.1:3002".into(),
                max_connections: 10,
            },
        ];
        RouteTable::new(&routes, Arc::new(BackendManager::new(&backends)))
    }

    #[test]
    fn one_candidate_per_target_in_order() {
        let table = table(vec![route(
            "profile",
            "/profile",
            0,
            vec![target("user", "users"), target("orders", "orders")],
        )]);

        let candidates = table.select(&inbound_with("/profile/7", &[]));
        let names: Vec<_> = candidates.iter().map(|c| c.attribution_name()).collect();
        assert_eq!(names, vec!["user", "orders"]);
        assert_eq!(candidates[0].server_addr(), Some("127.0.0.1:3001"));
        assert!(candidates.iter().all(|c| !c.is_merge()));
    }

    #[test]
    fn no_match_is_empty() {
        let table = table(vec![route("profile", "/profile", 0, vec![target("user", "users")])]);
        assert!(table.select(&inbound_with("/other", &[])).is_empty());
    }

    #[test]
    fn higher_priority_wins() {
        let table = table(vec![
            route("generic", "/", 0, vec![target("generic", "orders")]),
            route("specific", "/users", 10, vec![target("specific", "users")]),
        ]);

        let candidates = table.select(&inbound_with("/users/1", &[]));
        assert_eq!(candidates[0].attribution_name(), "specific");
    }

    #[test]
    fn saturated_cluster_yields_no_server() {
        let table = table(vec![route("users", "/users", 0, vec![target("user", "users")])]);

        let held = table.select(&inbound_with("/users", &[]));
        assert!(held[0].server().is_some());

        let starved = table.select(&inbound_with("/users", &[]));
        assert!(starved[0].server().is_none());

        drop(held);
        assert!(table.select(&inbound_with("/users", &[]))[0].server().is_some());
    }

    #[test]
    fn rewrite_template_expansion() {
        let req = inbound_with("/api/users/7?expand=orders", &[]);
        assert_eq!(expand_rewrite("/v2{path}?{query}", &req), "/v2/api/users/7?expand=orders");

        let bare = inbound_with("/api/users/7", &[]);
        assert_eq!(expand_rewrite("/v2{path}?{query}", &bare), "/v2/api/users/7");
    }

    #[test]
    fn placeholders_in_the_request_are_not_expanded() {
        let req = inbound_with("/files/%7Bquery%7D/{query}?q=1", &[]);
        assert_eq!(
            expand_rewrite("/v2{path}?{query}", &req),
            "/v2/files/%7Bquery%7D/{query}?q=1"
        );

        let literal = inbound_with("/a", &[]);
        assert_eq!(expand_rewrite("/x{other}{path}", &literal), "/x{other}/a");
    }
}
