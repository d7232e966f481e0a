//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → routing::Router (rewrite path, tag service header)
//!     → upstream.rs (service → authority)
//!     → hyper client → upstream
//!     → response.rs (error mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod upstream;

pub use request::X_REQUEST_ID;
pub use response::ProxyError;
pub use server::{AppState, HttpServer, Snapshot};
pub use upstream::UpstreamTable;
