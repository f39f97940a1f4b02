//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
filters = ["headers", "analysis"]

[listener]
bind_address = "127.0.0.1:8080"

[[backends]]
name = "users-1"
cluster = "users"
address = "127.0.0.1:3001"

[[backends]]
name = "orders-1"
cluster = "orders"
address = "127.0.0.1:3002"

[[routes]]
name = "profile"
path_prefix = "/profile"

[[routes.targets]]
attribution = "user"
cluster = "users"
path = "/users"

[[routes.targets]]
attribution = "orders"
cluster = "orders"
rewrite = "/v2/orders{path}?{query}"
"#;

    #[test]
    fn parses_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.filters, vec!["headers", "analysis"]);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.routes[0].targets.len(), 2);
        assert_eq!(config.routes[0].targets[1].rewrite.as_deref(), Some("/v2/orders{path}?{query}"));
        assert_eq!(config.backends[0].max_connections, 100);
    }

    #[test]
    fn defaults_apply_to_empty_file() {
        let config = parse_config("").unwrap();
        assert_eq!(config.filters, vec!["headers", "x-forwarded", "analysis"]);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn reports_validation_errors() {
        let err = parse_config(r#"filters = ["nope"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn bundled_demo_config_is_valid() {
        let config = parse_config(include_str!("../../demos/gateway.toml")).unwrap();
        assert!(config.admin.enabled);
        assert_eq!(config.routes.len(), 2);
    }
}
