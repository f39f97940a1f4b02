use std::sync::atomic::Ordering;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::config::TargetConfig;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub routes: usize,
}

#[derive(Serialize)]
pub struct RouteStatus {
    pub name: String,
    pub priority: u32,
    pub targets: Vec<TargetConfig>,
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub cluster: String,
    pub address: String,
    pub max_connections: usize,
    pub active_connections: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        routes: state.routes.load().routes().len(),
    })
}

/// Routes in match order.
pub async fn get_routes(State(state): State<AdminState>) -> Json<Vec<RouteStatus>> {
    let table = state.routes.load();
    Json(
        table
            .routes()
            .iter()
            .map(|r| RouteStatus {
                name: r.name.clone(),
                priority: r.priority,
                targets: r.targets.clone(),
            })
            .collect(),
    )
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let table = state.routes.load();
    Json(
        table
            .backends()
            .all_backends()
            .iter()
            .map(|b| BackendStatus {
                name: b.name.clone(),
                cluster: b.cluster.clone(),
                address: b.addr.clone(),
                max_connections: b.max_connections,
                active_connections: b.active_connections.load(Ordering::Relaxed),
            })
            .collect(),
    )
}

pub async fn get_filters(State(state): State<AdminState>) -> Json<Vec<&'static str>> {
    Json(state.filters.names())
}
