//! Service name → upstream authority table.

use std::collections::HashMap;

use axum::http::uri::{Authority, Scheme};
use axum::http::Uri;

use crate::config::validation::{parse_authority, ValidationError};
use crate::config::UpstreamConfig;

/// Where each service lives. One address per service; balancing across
/// instances belongs to whatever sits at that address.
#[derive(Debug, Clone, Default)]
pub struct UpstreamTable {
    by_service: HashMap<String, Authority>,
}

impl UpstreamTable {
    pub fn from_config(upstreams: &[UpstreamConfig]) -> Result<Self, ValidationError> {
        let mut by_service = HashMap::with_capacity(upstreams.len());
        for upstream in upstreams {
            let authority = parse_authority(&upstream.service, &upstream.address)?;
            if by_service
                .insert(upstream.service.clone(), authority)
                .is_some()
            {
                return Err(ValidationError::DuplicateUpstream {
                    service: upstream.service.clone(),
                });
            }
        }
        Ok(Self { by_service })
    }

    pub fn get(&self, service: &str) -> Option<&Authority> {
        self.by_service.get(service)
    }

    pub fn len(&self) -> usize {
        self.by_service.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_service.is_empty()
    }
}

/// Absolute URI for the rewritten path on `authority`, keeping the query.
pub fn upstream_uri(
    authority: &Authority,
    path: &str,
    query: Option<&str>,
) -> Result<Uri, axum::http::Error> {
    let path_and_query = match query {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority.clone())
        .path_and_query(path_and_query)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(service: &str, address: &str) -> UpstreamConfig {
        UpstreamConfig {
            service: service.into(),
            address: address.into(),
        }
    }

    #[test]
    fn test_lookup_by_service() {
        let table = UpstreamTable::from_config(&[
            upstream("voxpop-core", "127.0.0.1:3002"),
            upstream("voxpop-identity", "identity.internal"),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("voxpop-core").unwrap().as_str(), "127.0.0.1:3002");
        assert_eq!(table.get("voxpop-identity").unwrap().host(), "identity.internal");
        assert!(table.get("voxpop-admin").is_none());
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let err = UpstreamTable::from_config(&[
            upstream("core", "127.0.0.1:1"),
            upstream("core", "127.0.0.1:2"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateUpstream {
                service: "core".into()
            }
        );
    }

    #[test]
    fn test_upstream_uri_keeps_query() {
        let authority: Authority = "127.0.0.1:3002".parse().unwrap();

        let uri = upstream_uri(&authority, "/users/5", Some("expand=true")).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3002/users/5?expand=true");

        let uri = upstream_uri(&authority, "/", None).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3002/");
    }
}
