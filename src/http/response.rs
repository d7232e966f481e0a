//! Error responses.
//!
//! # Responsibilities
//! - Map routing and upstream failures to HTTP status codes
//!
//! # Design Decisions
//! - Malformed requests are the client's fault: 400
//! - Anything that goes wrong past the routing decision is a gateway error: 502
//! - Timeouts are answered by the timeout layer, not here

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::routing::InvalidRequestError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] InvalidRequestError),

    #[error("no upstream configured for service {service:?}")]
    NoUpstream { service: String },

    #[error("invalid upstream uri: {0}")]
    UpstreamUri(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::NoUpstream { .. } | ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamUri(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
