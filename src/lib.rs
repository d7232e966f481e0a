//! Prefix-based service router.
//!
//! Rewrites request paths and tags each request with the service that should
//! handle it, based on an ordered table of path prefixes. The [`routing`]
//! module is the pure core; the other modules host it as a standalone edge
//! process.
//!
//! ```
//! use service_router::routing::{RouteRequest, Router, RoutingRule};
//!
//! let router = Router::new(
//!     vec![
//!         RoutingRule::new("/identity", "voxpop-identity"),
//!         RoutingRule::new("/core", "voxpop-core"),
//!     ],
//!     "voxpop-core",
//! )?;
//!
//! let routed = router.dispatch(RouteRequest::from_uri("/identity/login"))?;
//! assert_eq!(routed.uri, "/login");
//! assert_eq!(routed.headers["x-service-name"], "voxpop-identity");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core
pub mod config;
pub mod routing;

// Hosting
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Router, RouteRequest, RoutingRule};
