//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile the rule table to surface routing errors before startup
//! - Check referential integrity (every selectable service has an upstream)
//! - Validate addresses and timeouts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, on startup and on reload

use std::collections::{BTreeSet, HashSet};
use std::net::SocketAddr;

use axum::http::uri::Authority;
use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::{RouterConfig, RoutingConfig};
use crate::routing::{ConfigError, Router};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener bind address {address:?} is not a socket address")]
    InvalidBindAddress { address: String },

    #[error("metrics address {address:?} is not a socket address")]
    InvalidMetricsAddress { address: String },

    #[error("routing: {0}")]
    Routing(#[from] ConfigError),

    #[error("service header {name:?} is not a valid header name")]
    InvalidServiceHeader { name: String },

    #[error("upstream for service {service:?} is defined more than once")]
    DuplicateUpstream { service: String },

    #[error("upstream address {address:?} for service {service:?} is not a valid authority")]
    InvalidUpstreamAddress { service: String, address: String },

    #[error("service {service:?} has no upstream")]
    MissingUpstream { service: String },

    #[error("timeouts.{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            address: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress {
            address: config.observability.metrics_address.clone(),
        });
    }

    if let Err(e) = build_router(&config.routing) {
        errors.push(e);
    }

    let mut upstream_services = HashSet::new();
    for upstream in &config.upstreams {
        if !upstream_services.insert(upstream.service.as_str()) {
            errors.push(ValidationError::DuplicateUpstream {
                service: upstream.service.clone(),
            });
        }
        if let Err(e) = parse_authority(&upstream.service, &upstream.address) {
            errors.push(e);
        }
    }

    let referenced: BTreeSet<&str> = std::iter::once(config.routing.default_service.as_str())
        .chain(config.routing.rules.iter().map(|r| r.service.as_str()))
        .filter(|s| !s.is_empty())
        .collect();
    for service in referenced {
        if !upstream_services.contains(service) {
            errors.push(ValidationError::MissingUpstream {
                service: service.to_string(),
            });
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "connect_secs",
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "request_secs",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Compile the configured rule table.
pub fn build_router(routing: &RoutingConfig) -> Result<Router, ValidationError> {
    let header = HeaderName::from_bytes(routing.service_header.as_bytes()).map_err(|_| {
        ValidationError::InvalidServiceHeader {
            name: routing.service_header.clone(),
        }
    })?;

    Ok(Router::with_header(
        routing.rules.clone(),
        routing.default_service.clone(),
        header,
    )?)
}

/// Parse an upstream address into a URI authority.
pub fn parse_authority(service: &str, address: &str) -> Result<Authority, ValidationError> {
    let invalid = || ValidationError::InvalidUpstreamAddress {
        service: service.to_string(),
        address: address.to_string(),
    };

    if address.is_empty() || address.contains('@') {
        return Err(invalid());
    }
    address.parse::<Authority>().map_err(|_| invalid())
}
