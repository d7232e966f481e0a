//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatch handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Dispatch requests through the routing table
//! - Forward requests to the selected service's upstream
//! - Swap in new routing snapshots on config reload

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{request::Parts, Request, Version},
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{validate_config, LoadError, RouterConfig};
use crate::config::validation::build_router;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::ProxyError;
use crate::http::upstream::{upstream_uri, UpstreamTable};
use crate::observability::metrics;
use crate::routing::{RouteRequest, Router as ServiceRouter};

/// Everything a request needs from configuration, swapped as one unit.
#[derive(Debug)]
pub struct Snapshot {
    pub router: ServiceRouter,
    pub upstreams: UpstreamTable,
}

impl Snapshot {
    /// Validate `config` and compile it.
    pub fn from_config(config: &RouterConfig) -> Result<Self, LoadError> {
        validate_config(config).map_err(LoadError::Validation)?;

        let router = build_router(&config.routing).map_err(|e| LoadError::Validation(vec![e]))?;
        let upstreams = UpstreamTable::from_config(&config.upstreams)
            .map_err(|e| LoadError::Validation(vec![e]))?;

        Ok(Self { router, upstreams })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<Snapshot>>,
    pub client: Client<HttpConnector, Body>,
}

impl AppState {
    /// Replace the active snapshot. In-flight requests keep the one they
    /// loaded; a config that fails to compile leaves the current one active.
    pub fn reload(&self, config: &RouterConfig) -> Result<(), LoadError> {
        let snapshot = Snapshot::from_config(config)?;
        tracing::info!(
            rules = snapshot.router.len(),
            upstreams = snapshot.upstreams.len(),
            default_service = %snapshot.router.default_service(),
            "Routing table swapped"
        );
        self.inner.store(Arc::new(snapshot));
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.load_full()
    }
}

/// HTTP server for the service router.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: RouterConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RouterConfig) -> Result<Self, LoadError> {
        let snapshot = Snapshot::from_config(&config)?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            inner: Arc::new(ArcSwap::from_pointee(snapshot)),
            client,
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            state,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RouterConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id(req.headers()),
                )
            }))
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configs arriving on `config_updates` are compiled and swapped in.
    /// Returns once `shutdown` fires and in-flight requests have drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RouterConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match state.reload(&config) {
                    Ok(()) => metrics::record_config_reload(true),
                    Err(e) => {
                        metrics::record_config_reload(false);
                        tracing::warn!(error = %e, "Rejected config update, keeping current routing table");
                    }
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the startup config.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Shared state, for reloading from outside the server task.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The Axum router, for driving the server without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Main handler: route, then forward to the selected service.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let snapshot = state.inner.load_full();

    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();
    let (mut parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_owned);

    let routed = match snapshot
        .router
        .route(RouteRequest::new(path.clone(), std::mem::take(&mut parts.headers)))
    {
        Ok(routed) => routed,
        Err(e) => {
            tracing::warn!(request_id = %request_id, path = %path, error = %e, "Rejected malformed request");
            let error = ProxyError::from(e);
            metrics::record_request(method.as_str(), error.status().as_u16(), "none", start_time);
            return error.into_response();
        }
    };

    let service = routed.service;
    metrics::record_dispatch(service, routed.rule.is_some());
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        rewritten = %routed.request.uri,
        service = %service,
        "Dispatching request"
    );

    let result = forward(
        &state.client,
        &snapshot.upstreams,
        service,
        parts,
        body,
        routed.request,
        query.as_deref(),
    )
    .await;

    match result {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), service, start_time);
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, service = %service, error = %e, "Upstream error");
            metrics::record_request(method.as_str(), e.status().as_u16(), service, start_time);
            e.into_response()
        }
    }
}

async fn forward(
    client: &Client<HttpConnector, Body>,
    upstreams: &UpstreamTable,
    service: &str,
    mut parts: Parts,
    body: Body,
    routed: RouteRequest,
    query: Option<&str>,
) -> Result<Response, ProxyError> {
    let authority = upstreams.get(service).ok_or_else(|| ProxyError::NoUpstream {
        service: service.to_string(),
    })?;

    parts.uri = upstream_uri(authority, &routed.uri, query)?;
    parts.headers = routed.headers;
    parts.version = Version::HTTP_11;

    let response = client.request(Request::from_parts(parts, body)).await?;
    Ok(response.map(Body::new))
}
