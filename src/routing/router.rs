//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes and their resolved upstreams
//! - Look up the unique route for a method + path
//! - Dispatch into the public or protected pipeline
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) pattern scan (acceptable for typical route counts)
//! - Explicit NotFound rather than a silent default upstream
//! - Authentication is placed structurally: only the protected group's
//!   pipeline contains the authenticator

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        uri::{Authority, InvalidUriParts, PathAndQuery, Scheme},
        Method, Request, Uri,
    },
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;

use crate::config::schema::{Access, RouteConfig, UpstreamConfig};
use crate::config::validation::ValidationError;
use crate::error::GatewayError;
use crate::http::pipeline::{Endpoint, Pipeline, RequestContext};
use crate::routing::matcher::PathPattern;

/// A resolved origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub name: String,
    scheme: Scheme,
    authority: Authority,
}

impl Upstream {
    /// Parse an `http://host[:port]` base URL.
    pub fn parse(name: &str, url: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &'static str| ValidationError::UpstreamUrl {
            name: name.to_string(),
            reason,
        };

        let uri: Uri = url.parse().map_err(|_| invalid("not a valid URL"))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(_) => return Err(invalid("only http:// origins are supported")),
            None => return Err(invalid("missing scheme")),
        }
        let authority = uri.authority().cloned().ok_or_else(|| invalid("missing host"))?;
        if let Some(pq) = uri.path_and_query() {
            if !matches!(pq.path(), "" | "/") || pq.query().is_some() {
                return Err(invalid("base URL must not carry a path or query"));
            }
        }

        Ok(Self {
            name: name.to_string(),
            scheme: Scheme::HTTP,
            authority,
        })
    }

    /// Outbound URI: this origin's scheme and host, the inbound path and query.
    pub fn target_uri(&self, inbound: &Uri) -> Result<Uri, InvalidUriParts> {
        let mut parts = inbound.clone().into_parts();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Uri::from_parts(parts)
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

/// Route descriptor.
#[derive(Debug)]
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    pub access: Access,
    pub upstream: Arc<Upstream>,
}

/// Parse a configured method name.
pub fn parse_method(raw: &str) -> Option<Method> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return None;
    }
    Method::from_bytes(upper.as_bytes()).ok()
}

/// Immutable table of compiled routes.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    /// Compile routes against the configured upstreams.
    ///
    /// Pattern overlaps are rejected by configuration validation, so at most
    /// one route matches any request.
    pub fn from_config(routes: &[RouteConfig], upstreams: &[UpstreamConfig]) -> Result<Self, ValidationError> {
        let mut resolved: HashMap<&str, Arc<Upstream>> = HashMap::new();
        for upstream in upstreams {
            resolved.insert(&upstream.name, Arc::new(Upstream::parse(&upstream.name, &upstream.url)?));
        }

        let mut compiled = Vec::with_capacity(routes.len());
        for route in routes {
            let id = route_id(route);
            let method = parse_method(&route.method).ok_or_else(|| ValidationError::RouteMethod {
                route: id.clone(),
            })?;
            let pattern = PathPattern::parse(&route.path).map_err(|source| ValidationError::RoutePath {
                route: id.clone(),
                source,
            })?;
            let upstream = resolved
                .get(route.upstream.as_str())
                .cloned()
                .ok_or_else(|| ValidationError::UnknownUpstream {
                    route: id,
                    upstream: route.upstream.clone(),
                })?;

            compiled.push(Arc::new(Route {
                method,
                pattern,
                access: route.access,
                upstream,
            }));
        }

        Ok(Self { routes: compiled })
    }

    /// Find the route for this method and path.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&Arc<Route>> {
        self.routes
            .iter()
            .find(|route| route.method == *method && route.pattern.matches(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Human-readable route identifier for errors and logs.
pub fn route_id(route: &RouteConfig) -> String {
    format!("{} {}", route.method, route.path)
}

/// Resolves the route, then hands off to the matching access group.
pub struct RouteDispatcher {
    table: RouteTable,
    public: Pipeline,
    protected: Pipeline,
}

impl RouteDispatcher {
    pub fn new(table: RouteTable, public: Pipeline, protected: Pipeline) -> Self {
        Self {
            table,
            public,
            protected,
        }
    }
}

impl Endpoint for RouteDispatcher {
    fn serve<'a>(&'a self, req: Request<Body>, ctx: &'a mut RequestContext) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let Some(route) = self.table.resolve(req.method(), req.uri().path()).cloned() else {
                tracing::warn!(method = %req.method(), path = %req.uri().path(), "No route matched");
                return GatewayError::NotFound.into_response();
            };

            let group = match route.access {
                Access::Public => &self.public,
                Access::Protected => &self.protected,
            };
            ctx.route = Some(route);
            group.dispatch(req, ctx).await
        })
    }
}
