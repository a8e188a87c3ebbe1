//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing upstreams)
//! - Validate value ranges (timeouts > 0, windows > 0)
//! - Detect overlapping routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::http::middleware::Cors;
use crate::routing::matcher::{PathPattern, PatternError};
use crate::routing::router::{parse_method, route_id, Upstream};
use crate::security::token::is_hmac;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("upstream name must not be empty")]
    EmptyUpstreamName,

    #[error("upstream '{0}' is defined more than once")]
    DuplicateUpstream(String),

    #[error("upstream '{name}': {reason}")]
    UpstreamUrl { name: String, reason: &'static str },

    #[error("route '{route}': invalid HTTP method")]
    RouteMethod { route: String },

    #[error("route '{route}': {source}")]
    RoutePath { route: String, source: PatternError },

    #[error("route '{route}' references unknown upstream '{upstream}'")]
    UnknownUpstream { route: String, upstream: String },

    #[error("routes '{first}' and '{second}' can match the same request")]
    OverlappingRoutes { first: String, second: String },

    #[error("auth.jwt_secret must not be empty")]
    EmptySecret,

    #[error("auth.algorithm {0:?} is not a shared-secret algorithm")]
    UnsupportedAlgorithm(Algorithm),

    #[error("rate_limit.capacity must be greater than zero")]
    ZeroCapacity,

    #[error("rate_limit.window_ms must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.idle_ttl_secs must cover at least one window")]
    IdleTtlShorterThanWindow,

    #[error("rate_limit.sweep_interval_secs must be greater than zero")]
    ZeroSweepInterval,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("cors.{field} is not a valid header value")]
    CorsHeader { field: &'static str },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let mut names = HashSet::new();
    for upstream in &config.upstreams {
        if upstream.name.is_empty() {
            errors.push(ValidationError::EmptyUpstreamName);
        } else if !names.insert(upstream.name.as_str()) {
            errors.push(ValidationError::DuplicateUpstream(upstream.name.clone()));
        }
        if let Err(e) = Upstream::parse(&upstream.name, &upstream.url) {
            errors.push(e);
        }
    }

    validate_routes(config, &names, &mut errors);

    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::EmptySecret);
    }
    if !is_hmac(config.auth.algorithm) {
        errors.push(ValidationError::UnsupportedAlgorithm(config.auth.algorithm));
    }

    let rl = &config.rate_limit;
    if rl.capacity == 0 {
        errors.push(ValidationError::ZeroCapacity);
    }
    if rl.window_ms == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if rl.idle_ttl_secs.saturating_mul(1000) < rl.window_ms {
        errors.push(ValidationError::IdleTtlShorterThanWindow);
    }
    if rl.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_ms"));
    }
    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("request_ms"));
    }

    if let Err(e) = Cors::from_config(&config.cors) {
        errors.push(e);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_routes(config: &GatewayConfig, upstreams: &HashSet<&str>, errors: &mut Vec<ValidationError>) {
    let mut compiled: Vec<(String, String, PathPattern)> = Vec::new();

    for route in &config.routes {
        let id = route_id(route);

        if !upstreams.contains(route.upstream.as_str()) {
            errors.push(ValidationError::UnknownUpstream {
                route: id.clone(),
                upstream: route.upstream.clone(),
            });
        }

        let method = parse_method(&route.method);
        if method.is_none() {
            errors.push(ValidationError::RouteMethod { route: id.clone() });
        }

        let pattern = match PathPattern::parse(&route.path) {
            Ok(p) => p,
            Err(source) => {
                errors.push(ValidationError::RoutePath { route: id, source });
                continue;
            }
        };

        let Some(method) = method else { continue };
        for (other_method, other_id, other_pattern) in &compiled {
            if *other_method == method.as_str() && other_pattern.overlaps(&pattern) {
                errors.push(ValidationError::OverlappingRoutes {
                    first: other_id.clone(),
                    second: id.clone(),
                });
            }
        }
        compiled.push((method.as_str().to_string(), id, pattern));
    }
}
