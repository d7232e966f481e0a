//! Shared utilities for integration testing.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::Request;
use axum::{Json, Router};
use serde_json::{json, Value};
use service_router::config::{RouterConfig, UpstreamConfig};
use service_router::lifecycle::Shutdown;
use service_router::routing::RoutingRule;
use service_router::HttpServer;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Start a backend that answers every request with a JSON description of
/// what it received.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(move |req: Request<Body>| async move {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, 64 * 1024).await.unwrap();
        let services: Vec<String> = parts
            .headers
            .get_all("x-service-name")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();

        Json(json!({
            "backend": name,
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "services": services,
            "request_id": parts.headers.get("x-request-id").and_then(|v| v.to_str().ok()),
            "body": String::from_utf8_lossy(&body),
        }))
    });

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// The two-service table the router was first built for.
pub fn voxpop_config(identity: SocketAddr, core: SocketAddr) -> RouterConfig {
    let mut config = RouterConfig::new("voxpop-core");
    config.listener.bind_address = "127.0.0.1:0".into();
    config.routing.rules = vec![
        RoutingRule::new("/identity", "voxpop-identity"),
        RoutingRule::new("/core", "voxpop-core"),
    ];
    config.upstreams = vec![
        UpstreamConfig {
            service: "voxpop-identity".into(),
            address: identity.to_string(),
        },
        UpstreamConfig {
            service: "voxpop-core".into(),
            address: core.to_string(),
        },
    ];
    config
}

/// A router server running on an ephemeral port.
pub struct RunningRouter {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<RouterConfig>,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl RunningRouter {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_router(config: RouterConfig) -> RunningRouter {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (updates, config_updates) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        server.run(listener, config_updates, server_shutdown).await
    });

    RunningRouter {
        addr,
        shutdown,
        updates,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub async fn get_json(client: &reqwest::Client, url: &str) -> Value {
    let res = client.get(url).send().await.expect("router unreachable");
    assert_eq!(res.status(), 200, "unexpected status for {url}");
    res.json().await.unwrap()
}
