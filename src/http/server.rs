//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway handler
//! - Wire up middleware (tracing, body limit, request ID)
//! - Bind server to listener
//! - Hand each request to the route table and the fan-out coordinator
//! - Swap in new route tables on config reload

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::filters::{FilterChain, FilterError};
use crate::http::{status_only, InboundRequest};
use crate::observability::metrics;
use crate::proxy::{CandidateDispatcher, FanoutCoordinator, Resolver};
use crate::routing::RouteTable;
use crate::transport::{HyperTransport, Transport};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<ArcSwap<RouteTable>>,
    pub coordinator: Arc<FanoutCoordinator>,
    pub max_body_size: usize,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl HttpServer {
    /// Build the server with the configured filter chain and the hyper transport.
    pub fn new(config: GatewayConfig) -> Result<Self, FilterError> {
        let filters = FilterChain::from_names(&config.filters, &config.filter_settings)?;
        let timeout = match config.timeouts.backend_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let transport = Arc::new(HyperTransport::new(timeout, config.listener.max_body_size));
        Ok(Self::with_parts(config, filters, transport))
    }

    /// Build the server around an explicit filter chain and transport.
    pub fn with_parts(config: GatewayConfig, filters: FilterChain, transport: Arc<dyn Transport>) -> Self {
        let routes = Arc::new(ArcSwap::from_pointee(RouteTable::from_config(&config)));
        let coordinator = Arc::new(FanoutCoordinator::new(CandidateDispatcher::new(filters, transport)));

        let state = AppState {
            routes,
            coordinator,
            max_body_size: config.listener.max_body_size,
        };

        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_size)),
            )
    }

    /// Shared handle to the live route table.
    pub fn routes(&self) -> Arc<ArcSwap<RouteTable>> {
        self.state.routes.clone()
    }

    pub fn filters(&self) -> FilterChain {
        self.state.coordinator.dispatcher().filters().clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Validated configs arriving on `config_updates` replace the route
    /// table. Filter changes are reported but need a restart.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(apply_config_updates(
            self.state.routes.clone(),
            self.config.filters.clone(),
            config_updates,
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_config_updates(
    routes: Arc<ArcSwap<RouteTable>>,
    filters: Vec<String>,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
) {
    while let Some(config) = updates.recv().await {
        if config.filters != filters {
            tracing::warn!(
                configured = ?config.filters,
                running = ?filters,
                "Filter list changed; restart to apply"
            );
        }
        routes.store(Arc::new(RouteTable::from_config(&config)));
        tracing::info!(routes = config.routes.len(), backends = config.backends.len(), "Route table reloaded");
    }
}

/// Gateway handler: buffer, resolve, fan out, respond.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer request body");
            metrics::record_request(&method, 413, 0, start_time);
            return status_only(StatusCode::PAYLOAD_TOO_LARGE);
        }
    };

    // Dropping the handler future (caller hung up) cancels in-flight backend calls.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let mut inbound = InboundRequest::new(parts, body).with_cancellation(cancel);
    if let Some(addr) = client_addr {
        inbound = inbound.with_client_addr(addr);
    }

    tracing::debug!(
        request_id = inbound.request_id().unwrap_or("unknown"),
        method = %inbound.method,
        path = %inbound.path(),
        "Dispatching request"
    );

    let table = state.routes.load_full();
    let candidates = table.select(&inbound);
    let count = candidates.len();
    if count == 0 {
        tracing::warn!(path = %inbound.path(), "No route matched");
    }

    let resolver: Arc<dyn Resolver> = table;
    let response = state
        .coordinator
        .dispatch(Arc::new(inbound), resolver, candidates)
        .await;

    metrics::record_request(&method, response.status().as_u16(), count, start_time);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, RouteConfig, TargetConfig};
    use crate::proxy::testing::{MockTransport, Reply};
    use axum::body::Bytes;
    use tower::ServiceExt;

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.backends.push(BackendConfig {
            name: "u1".into(),
            cluster: "users".into(),
            address: "127.0.0.1:7101".into(),
            max_connections: 10,
        });
        config.routes.push(RouteConfig {
            name: "users".into(),
            host: None,
            path_prefix: Some("/users".into()),
            priority: 0,
            targets: vec![TargetConfig {
                attribution: "user".into(),
                cluster: "users".into(),
                path: None,
                rewrite: None,
            }],
        });
        config
    }

    #[tokio::test]
    async fn routes_through_the_coordinator() {
        let transport = Arc::new(MockTransport::default().reply("127.0.0.1:7101", Reply::ok("{\"id\":1}")));
        let server = HttpServer::with_parts(config(), FilterChain::default(), transport.clone());

        let response = server
            .router
            .oneshot(Request::get("/users/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"{\"id\":1}"));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn unmatched_request_is_service_unavailable() {
        let server = HttpServer::with_parts(config(), FilterChain::default(), Arc::new(MockTransport::default()));

        let response = server
            .router
            .oneshot(Request::get("/elsewhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn reload_swaps_route_table() {
        let server = HttpServer::with_parts(config(), FilterChain::default(), Arc::new(MockTransport::default()));
        let routes = server.routes();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut next = config();
        next.routes[0].path_prefix = Some("/people".into());
        tx.send(next).unwrap();
        drop(tx);
        apply_config_updates(routes.clone(), Vec::new(), rx).await;

        assert_eq!(routes.load().routes()[0].name, "users");
        let inbound = crate::proxy::testing::inbound("/people/1");
        assert_eq!(routes.load().select(&inbound).len(), 1);
    }

    #[tokio::test]
    async fn unknown_filter_fails_construction() {
        let mut config = config();
        config.filters.push("nope".into());
        assert!(matches!(HttpServer::new(config), Err(FilterError::Unknown(_))));
    }
}
