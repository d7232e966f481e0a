//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::{RoutingRule, SERVICE_HEADER};

/// Root configuration for the service router.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Listener configuration (bind address).
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Prefix rules and the default service.
    pub routing: RoutingConfig,

    /// Where each service is reachable.
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,

    /// Timeout configuration.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl RouterConfig {
    /// Minimal config routing everything to `default_service`.
    pub fn new(default_service: impl Into<String>) -> Self {
        Self {
            listener: ListenerConfig::default(),
            routing: RoutingConfig::new(default_service),
            upstreams: Vec::new(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Rule table configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Service used when no rule matches.
    pub default_service: String,

    /// Header that carries the selected service.
    #[serde(default = "default_service_header")]
    pub service_header: String,

    /// Rules in match order. The first matching rule wins.
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}

impl RoutingConfig {
    pub fn new(default_service: impl Into<String>) -> Self {
        Self {
            default_service: default_service.into(),
            service_header: default_service_header(),
            rules: Vec::new(),
        }
    }
}

fn default_service_header() -> String {
    SERVICE_HEADER.as_str().to_string()
}

/// Upstream address for one service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Service name as used in routing rules.
    pub service: String,

    /// Upstream authority (e.g., "127.0.0.1:3000" or "core.internal:80").
    pub address: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for production.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
