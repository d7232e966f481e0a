//! Routing error types.

use thiserror::Error;

/// Errors raised while building a [`Router`](super::Router).
///
/// Any of these is fatal: a router with an invalid or ambiguous table must
/// never start serving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Rule at `index` has an empty prefix.
    #[error("rule #{index} has an empty prefix")]
    EmptyPrefix { index: usize },

    /// Prefix does not begin with `/`.
    #[error("prefix {prefix:?} must start with '/'")]
    MissingLeadingSeparator { prefix: String },

    /// Prefix begins with more than one `/`.
    #[error("prefix {prefix:?} must start with a single '/'")]
    RepeatedLeadingSeparator { prefix: String },

    /// Prefix ends with `/` (this includes the bare root prefix).
    #[error("prefix {prefix:?} must not end with '/'")]
    TrailingSeparator { prefix: String },

    /// Rule has an empty service name.
    #[error("rule for prefix {prefix:?} has an empty service name")]
    EmptyServiceName { prefix: String },

    /// Service name cannot be carried in an HTTP header.
    #[error("service name {service:?} is not a valid header value")]
    InvalidServiceName { service: String },

    /// Default service is empty.
    #[error("default service must not be empty")]
    EmptyDefaultService,

    /// Two rules share the same prefix, so the tie-break would be undefined.
    #[error("prefix {prefix:?} is configured more than once (rules #{first} and #{second})")]
    DuplicatePrefix {
        prefix: String,
        first: usize,
        second: usize,
    },
}

/// Errors raised by [`Router::dispatch`](super::Router::dispatch) for
/// malformed inbound requests.
///
/// The router never produces HTTP responses; the host decides how to answer
/// (typically `400 Bad Request`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequestError {
    #[error("request uri is empty")]
    EmptyUri,

    #[error("request uri {uri:?} does not start with '/'")]
    MissingLeadingSeparator { uri: String },
}
