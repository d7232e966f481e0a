//! Rule table lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled prefix rules in configuration order
//! - Select the service for a request path
//! - Rewrite the path and tag the request with the service header
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) ordered prefix scan; a large table would want a trie or a sorted
//!   prefix index, which changes cost but not results
//! - First match wins. Rules are never reordered for specificity, so `/core`
//!   listed before `/core/v2` makes the second rule unreachable. Put more
//!   specific prefixes first.
//! - Explicit default service rather than a no-match error

use std::collections::HashMap;

use axum::http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use super::error::{ConfigError, InvalidRequestError};
use super::matcher::PathPrefix;
use super::request::RouteRequest;

/// Header carrying the selected service to downstream infrastructure.
pub const SERVICE_HEADER: HeaderName = HeaderName::from_static("x-service-name");

/// A (path prefix, service name) pair as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoutingRule {
    /// Path prefix, e.g. `/identity`.
    pub prefix: String,

    /// Service selected when the prefix matches.
    pub service: String,
}

impl RoutingRule {
    pub fn new(prefix: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            service: service.into(),
        }
    }
}

/// Compiled form of a [`RoutingRule`].
#[derive(Debug, Clone)]
struct Route {
    prefix: PathPrefix,
    service: String,
    service_value: HeaderValue,
}

/// Outcome of a routing decision for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Selected service name.
    pub service: &'a str,

    /// Path to forward upstream.
    pub path: &'a str,

    /// Index of the matched rule, `None` when the default service applies.
    pub rule: Option<usize>,
}

impl Resolution<'_> {
    pub fn is_default(&self) -> bool {
        self.rule.is_none()
    }
}

/// A dispatched request together with the routing decision behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed<'a> {
    pub request: RouteRequest,
    pub service: &'a str,
    pub rule: Option<usize>,
}

/// Prefix router with first-match-wins semantics.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
    default_service: String,
    default_value: HeaderValue,
    header: HeaderName,
}

impl Router {
    /// Build a router that tags requests with [`SERVICE_HEADER`].
    pub fn new(
        rules: Vec<RoutingRule>,
        default_service: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::with_header(rules, default_service, SERVICE_HEADER)
    }

    /// Build a router that tags requests with a custom header.
    pub fn with_header(
        rules: Vec<RoutingRule>,
        default_service: impl Into<String>,
        header: HeaderName,
    ) -> Result<Self, ConfigError> {
        let default_service = default_service.into();
        if default_service.is_empty() {
            return Err(ConfigError::EmptyDefaultService);
        }
        let default_value = service_value(&default_service)?;

        let mut seen: HashMap<String, usize> = HashMap::with_capacity(rules.len());
        let mut routes = Vec::with_capacity(rules.len());

        for (index, rule) in rules.into_iter().enumerate() {
            let prefix = PathPrefix::parse(rule.prefix, index)?;
            if rule.service.is_empty() {
                return Err(ConfigError::EmptyServiceName {
                    prefix: prefix.to_string(),
                });
            }
            if let Some(&first) = seen.get(prefix.as_str()) {
                return Err(ConfigError::DuplicatePrefix {
                    prefix: prefix.to_string(),
                    first,
                    second: index,
                });
            }
            seen.insert(prefix.to_string(), index);

            let service_value = service_value(&rule.service)?;
            routes.push(Route {
                prefix,
                service: rule.service,
                service_value,
            });
        }

        let router = Self {
            routes,
            default_service,
            default_value,
            header,
        };

        for (earlier, later) in router.shadowed_rules() {
            tracing::warn!(
                earlier = %router.routes[earlier].prefix,
                shadowed = %router.routes[later].prefix,
                "Rule can never match: an earlier prefix covers it"
            );
        }

        tracing::debug!(
            rules = router.routes.len(),
            default_service = %router.default_service,
            "Router compiled"
        );

        Ok(router)
    }

    /// Decide where `uri` goes without touching any headers.
    pub fn resolve<'a>(&'a self, uri: &'a str) -> Result<Resolution<'a>, InvalidRequestError> {
        check_uri(uri)?;

        for (index, route) in self.routes.iter().enumerate() {
            if let Some(path) = route.prefix.strip(uri) {
                return Ok(Resolution {
                    service: &route.service,
                    path,
                    rule: Some(index),
                });
            }
        }

        Ok(Resolution {
            service: &self.default_service,
            path: uri,
            rule: None,
        })
    }

    /// Rewrite the request path and set the service header.
    ///
    /// Any existing values of the service header are replaced by exactly one
    /// value. All other headers pass through. On error the request is
    /// dropped unmodified.
    pub fn dispatch(&self, req: RouteRequest) -> Result<RouteRequest, InvalidRequestError> {
        self.route(req).map(|routed| routed.request)
    }

    /// Same as [`dispatch`](Self::dispatch), also reporting which service
    /// and rule were selected.
    pub fn route(&self, mut req: RouteRequest) -> Result<Routed<'_>, InvalidRequestError> {
        let (rewritten, rule) = {
            let resolution = self.resolve(&req.uri)?;
            let rewritten = resolution.rule.map(|_| resolution.path.to_owned());
            (rewritten, resolution.rule)
        };

        if let Some(path) = rewritten {
            req.uri = path;
        }
        let (service, value) = match rule {
            Some(index) => {
                let route = &self.routes[index];
                (route.service.as_str(), &route.service_value)
            }
            None => (self.default_service.as_str(), &self.default_value),
        };
        req.headers.insert(self.header.clone(), value.clone());

        Ok(Routed {
            request: req,
            service,
            rule,
        })
    }

    /// Pairs `(earlier, later)` where rule `later` is unreachable because
    /// rule `earlier` matches every path it would.
    pub fn shadowed_rules(&self) -> Vec<(usize, usize)> {
        let mut shadowed = Vec::new();
        for (later, route) in self.routes.iter().enumerate() {
            if let Some(earlier) = self.routes[..later]
                .iter()
                .position(|r| route.prefix.is_covered_by(&r.prefix))
            {
                shadowed.push((earlier, later));
            }
        }
        shadowed
    }

    /// Rules in match order as `(prefix, service)`.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes
            .iter()
            .map(|r| (r.prefix.as_str(), r.service.as_str()))
    }

    /// Every service this router can select, default included.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.default_service.as_str())
            .chain(self.routes.iter().map(|r| r.service.as_str()))
    }

    pub fn default_service(&self) -> &str {
        &self.default_service
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn service_value(service: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(service).map_err(|_| ConfigError::InvalidServiceName {
        service: service.to_string(),
    })
}

fn check_uri(uri: &str) -> Result<(), InvalidRequestError> {
    if uri.is_empty() {
        return Err(InvalidRequestError::EmptyUri);
    }
    if !uri.starts_with('/') {
        return Err(InvalidRequestError::MissingLeadingSeparator {
            uri: uri.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use std::sync::Arc;

    fn voxpop() -> Router {
        Router::new(
            vec![
                RoutingRule::new("/identity", "voxpop-identity"),
                RoutingRule::new("/core", "voxpop-core"),
            ],
            "voxpop-default",
        )
        .unwrap()
    }

    fn service_of(req: &RouteRequest) -> Vec<&str> {
        req.headers
            .get_all(SERVICE_HEADER)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_exact_prefix_rewrites_to_root() {
        let out = voxpop().dispatch(RouteRequest::from_uri("/identity")).unwrap();
        assert_eq!(out.uri, "/");
        assert_eq!(service_of(&out), vec!["voxpop-identity"]);
    }

    #[test]
    fn test_partial_segment_falls_through() {
        let out = voxpop().dispatch(RouteRequest::from_uri("/identityx")).unwrap();
        assert_eq!(out.uri, "/identityx");
        assert_eq!(service_of(&out), vec!["voxpop-default"]);

        let out = voxpop().dispatch(RouteRequest::from_uri("/corevette")).unwrap();
        assert_eq!(out.uri, "/corevette");
        assert_eq!(service_of(&out), vec!["voxpop-default"]);
    }

    #[test]
    fn test_prefix_stripped_from_nested_path() {
        let out = voxpop().dispatch(RouteRequest::from_uri("/core/users/5")).unwrap();
        assert_eq!(out.uri, "/users/5");
        assert_eq!(service_of(&out), vec!["voxpop-core"]);
    }

    #[test]
    fn test_unknown_path_uses_default_service() {
        let out = voxpop().dispatch(RouteRequest::from_uri("/unknown/path")).unwrap();
        assert_eq!(out.uri, "/unknown/path");
        assert_eq!(service_of(&out), vec!["voxpop-default"]);

        let out = voxpop().dispatch(RouteRequest::from_uri("/")).unwrap();
        assert_eq!(out.uri, "/");
        assert_eq!(service_of(&out), vec!["voxpop-default"]);
    }

    #[test]
    fn test_existing_service_header_is_overwritten() {
        let mut headers = HeaderMap::new();
        headers.append(
            HeaderName::from_bytes(b"X-Service-Name").unwrap(),
            HeaderValue::from_static("spoofed"),
        );
        headers.append(SERVICE_HEADER, HeaderValue::from_static("spoofed-again"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let out = voxpop()
            .dispatch(RouteRequest::new("/core/items", headers))
            .unwrap();

        assert_eq!(service_of(&out), vec!["voxpop-core"]);
        assert_eq!(out.headers.get("accept").unwrap(), "application/json");
        assert_eq!(out.headers.len(), 2);
    }

    #[test]
    fn test_dispatch_is_pure() {
        let router = voxpop();
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        let req = RouteRequest::new("/identity/login", headers);

        let first = router.dispatch(req.clone()).unwrap();
        let second = router.dispatch(req).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_first_match_wins_over_longest_prefix() {
        let router = Router::new(
            vec![
                RoutingRule::new("/core", "core-v1"),
                RoutingRule::new("/core/v2", "core-v2"),
            ],
            "fallback",
        )
        .unwrap();

        let out = router.dispatch(RouteRequest::from_uri("/core/v2/users")).unwrap();
        assert_eq!(out.uri, "/v2/users");
        assert_eq!(service_of(&out), vec!["core-v1"]);
        assert_eq!(router.shadowed_rules(), vec![(0, 1)]);
    }

    #[test]
    fn test_specific_prefix_first_is_reachable() {
        let router = Router::new(
            vec![
                RoutingRule::new("/core/v2", "core-v2"),
                RoutingRule::new("/core", "core-v1"),
            ],
            "fallback",
        )
        .unwrap();

        let out = router.dispatch(RouteRequest::from_uri("/core/v2/users")).unwrap();
        assert_eq!(out.uri, "/users");
        assert_eq!(service_of(&out), vec!["core-v2"]);

        let out = router.dispatch(RouteRequest::from_uri("/core/v3")).unwrap();
        assert_eq!(out.uri, "/v3");
        assert_eq!(service_of(&out), vec!["core-v1"]);
        assert!(router.shadowed_rules().is_empty());
    }

    #[test]
    fn test_boundary_matches_select_rule() {
        let router = voxpop();
        let cases = [
            ("/identity", "/", "voxpop-identity"),
            ("/identity/", "/", "voxpop-identity"),
            ("/identity/a/b?c", "/a/b?c", "voxpop-identity"),
            ("/core", "/", "voxpop-core"),
            ("/core//x", "//x", "voxpop-core"),
        ];

        for (uri, path, service) in cases {
            let resolution = router.resolve(uri).unwrap();
            assert_eq!(resolution.path, path, "uri {uri}");
            assert_eq!(resolution.service, service, "uri {uri}");
            assert!(!resolution.is_default());
        }
    }

    #[test]
    fn test_invalid_request_uri() {
        let router = voxpop();
        assert_eq!(
            router.dispatch(RouteRequest::from_uri("")),
            Err(InvalidRequestError::EmptyUri)
        );
        assert!(matches!(
            router.dispatch(RouteRequest::from_uri("core/users")),
            Err(InvalidRequestError::MissingLeadingSeparator { .. })
        ));
    }

    #[test]
    fn test_config_errors() {
        assert_eq!(
            Router::new(vec![], "").unwrap_err(),
            ConfigError::EmptyDefaultService
        );
        assert_eq!(
            Router::new(vec![RoutingRule::new("", "svc")], "default").unwrap_err(),
            ConfigError::EmptyPrefix { index: 0 }
        );
        assert!(matches!(
            Router::new(vec![RoutingRule::new("core", "svc")], "default"),
            Err(ConfigError::MissingLeadingSeparator { .. })
        ));
        assert!(matches!(
            Router::new(vec![RoutingRule::new("/core", "")], "default"),
            Err(ConfigError::EmptyServiceName { .. })
        ));
        assert!(matches!(
            Router::new(vec![RoutingRule::new("/core", "bad\nname")], "default"),
            Err(ConfigError::InvalidServiceName { .. })
        ));
        assert_eq!(
            Router::new(
                vec![
                    RoutingRule::new("/core", "a"),
                    RoutingRule::new("/identity", "b"),
                    RoutingRule::new("/core", "c"),
                ],
                "default",
            )
            .unwrap_err(),
            ConfigError::DuplicatePrefix {
                prefix: "/core".into(),
                first: 0,
                second: 2,
            }
        );
    }

    #[test]
    fn test_empty_table_routes_everything_to_default() {
        let router = Router::new(vec![], "only").unwrap();
        assert!(router.is_empty());
        let out = router.dispatch(RouteRequest::from_uri("/core/x")).unwrap();
        assert_eq!(out.uri, "/core/x");
        assert_eq!(service_of(&out), vec!["only"]);
    }

    #[test]
    fn test_custom_header_name() {
        let router = Router::with_header(
            vec![RoutingRule::new("/core", "voxpop-core")],
            "voxpop-core",
            HeaderName::from_static("x-upstream"),
        )
        .unwrap();

        let out = router.dispatch(RouteRequest::from_uri("/core/a")).unwrap();
        assert_eq!(out.headers.get("x-upstream").unwrap(), "voxpop-core");
        assert!(out.headers.get(SERVICE_HEADER).is_none());
    }

    #[test]
    fn test_concurrent_dispatch_shares_table() {
        let router = Arc::new(voxpop());

        std::thread::scope(|s| {
            for i in 0..8 {
                let router = router.clone();
                s.spawn(move || {
                    let out = router
                        .dispatch(RouteRequest::from_uri(format!("/core/items/{i}")))
                        .unwrap();
                    assert_eq!(out.uri, format!("/items/{i}"));
                });
            }
        });
    }

    #[test]
    fn test_route_reports_decision() {
        let router = voxpop();

        let routed = router.route(RouteRequest::from_uri("/core/a")).unwrap();
        assert_eq!(routed.service, "voxpop-core");
        assert_eq!(routed.rule, Some(1));
        assert_eq!(routed.request.uri, "/a");

        let routed = router.route(RouteRequest::from_uri("/other")).unwrap();
        assert_eq!(routed.service, "voxpop-default");
        assert_eq!(routed.rule, None);
    }

    #[test]
    fn test_services_lists_default_first() {
        let router = voxpop();
        let services: Vec<_> = router.services().collect();
        assert_eq!(
            services,
            vec!["voxpop-default", "voxpop-identity", "voxpop-core"]
        );
    }
}
