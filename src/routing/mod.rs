//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (uri, headers)
//!     → router.rs (ordered rule scan)
//!     → matcher.rs (boundary-respecting prefix match)
//!     → Return: rewritten request tagged with the service header
//!
//! Rule Compilation (at startup):
//!     RoutingRule[]
//!     → Validate prefixes and service names
//!     → Reject duplicate prefixes
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always produces the same output
//! - First match wins (ordered by configuration, not by specificity)

pub mod error;
pub mod matcher;
pub mod request;
pub mod router;

pub use error::{ConfigError, InvalidRequestError};
pub use matcher::PathPrefix;
pub use request::RouteRequest;
pub use router::{Resolution, Routed, Router, RoutingRule, SERVICE_HEADER};
