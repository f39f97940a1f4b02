//! Fan-out HTTP gateway library.

pub mod admin;
pub mod config;
pub mod filters;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod transport;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
