//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (targets reference existing clusters)
//! - Check every configured filter name is registered
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::filters::registry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("unknown filter <{0}>")]
    UnknownFilter(String),

    #[error("filter <{0}> listed more than once")]
    DuplicateFilter(String),

    #[error("admin api_key must not be empty")]
    EmptyApiKey,

    #[error("duplicate backend name {0:?}")]
    DuplicateBackend(String),

    #[error("backend {0:?} must allow at least one connection")]
    ZeroConnections(String),

    #[error("duplicate route name {0:?}")]
    DuplicateRoute(String),

    #[error("route {0:?} has no targets")]
    NoTargets(String),

    #[error("route {route:?} repeats attribution {attribution:?}")]
    DuplicateAttribution { route: String, attribution: String },

    #[error("route {route:?} references unknown cluster {cluster:?}")]
    UnknownCluster { route: String, cluster: String },

    #[error("route {route:?} target path {path:?} must start with '/'")]
    InvalidPath { route: String, path: String },
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener", &config.listener.bind_address);
    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::EmptyApiKey);
        }
    }
    if config.observability.metrics_enabled {
        check_socket_addr(&mut errors, "metrics", &config.observability.metrics_address);
    }

    let mut seen = HashSet::new();
    for name in &config.filters {
        if !registry::is_registered(name) {
            errors.push(ValidationError::UnknownFilter(name.clone()));
        } else if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateFilter(name.clone()));
        }
    }

    let mut backend_names = HashSet::new();
    let mut clusters = HashSet::new();
    for backend in &config.backends {
        if !backend_names.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        if Authority::from_str(&backend.address).is_err() || backend.address.contains('/') {
            errors.push(ValidationError::InvalidAddress {
                field: "backend",
                value: backend.address.clone(),
            });
        }
        if backend.max_connections == 0 {
            errors.push(ValidationError::ZeroConnections(backend.name.clone()));
        }
        clusters.insert(backend.cluster.as_str());
    }

    let mut route_names = HashSet::new();
    for route in &config.routes {
        if !route_names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        if route.targets.is_empty() {
            errors.push(ValidationError::NoTargets(route.name.clone()));
        }

        let mut attributions = HashSet::new();
        for target in &route.targets {
            if !attributions.insert(target.attribution.as_str()) {
                errors.push(ValidationError::DuplicateAttribution {
                    route: route.name.clone(),
                    attribution: target.attribution.clone(),
                });
            }
            if !clusters.contains(target.cluster.as_str()) {
                errors.push(ValidationError::UnknownCluster {
                    route: route.name.clone(),
                    cluster: target.cluster.clone(),
                });
            }
            if let Some(path) = &target.path {
                if !path.starts_with('/') {
                    errors.push(ValidationError::InvalidPath {
                        route: route.name.clone(),
                        path: path.clone(),
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, RouteConfig, TargetConfig};

    fn target(attribution: &str, cluster: &str) -> TargetConfig {
        TargetConfig {
            attribution: attribution.into(),
            cluster: cluster.into(),
            path: None,
            rewrite: None,
        }
    }

    fn valid() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.backends.push(BackendConfig {
            name: "u1".into(),
            cluster: "users".into(),
            address: "127.0.0.1:3001".into(),
            max_connections: 10,
        });
        config.routes.push(RouteConfig {
            name: "users".into(),
            host: None,
            path_prefix: Some("/users".into()),
            priority: 0,
            targets: vec![target("user", "users")],
        });
        config
    }

    #[test]
    fn accepts_valid_config() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid();
        config.filters.push("bogus".into());
        config.filters.push("headers".into());
        config.backends[0].max_connections = 0;
        config.routes[0].targets.push(target("user", "missing"));
        config.routes[0].targets[0].path = Some("relative".into());

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::UnknownFilter("bogus".into())));
        assert!(errors.contains(&ValidationError::DuplicateFilter("headers".into())));
        assert!(errors.contains(&ValidationError::ZeroConnections("u1".into())));
        assert!(errors.contains(&ValidationError::DuplicateAttribution {
            route: "users".into(),
            attribution: "user".into(),
        }));
        assert!(errors.contains(&ValidationError::UnknownCluster {
            route: "users".into(),
            cluster: "missing".into(),
        }));
        assert!(errors.contains(&ValidationError::InvalidPath {
            route: "users".into(),
            path: "relative".into(),
        }));
    }

    #[test]
    fn rejects_bad_addresses() {
        let mut config = valid();
        config.listener.bind_address = "not an address".into();
        config.backends[0].address = "http://127.0.0.1:3001/".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
