//! Control-plane server: read-only views of the running gateway.
//!
//! Every endpoint requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::{middleware, routing::get, Router};

use crate::filters::FilterChain;
use crate::routing::RouteTable;

use self::auth::admin_auth_middleware;
use self::handlers::{get_backends, get_filters, get_routes, get_status};

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub routes: Arc<ArcSwap<RouteTable>>,
    pub filters: FilterChain,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(routes: Arc<ArcSwap<RouteTable>>, filters: FilterChain, api_key: &str) -> Self {
        Self {
            routes,
            filters,
            api_key: Arc::from(api_key),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/routes", get(get_routes))
        .route("/backends", get(get_backends))
        .route("/filters", get(get_filters))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
