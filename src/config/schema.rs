//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::net::IpAddr;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Origins requests are forwarded to.
    pub upstreams: Vec<UpstreamConfig>,

    /// Route table mapping method + path to an origin.
    pub routes: Vec<RouteConfig>,

    /// Bearer token verification.
    pub auth: AuthConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Outbound timeouts.
    pub timeouts: TimeoutConfig,

    /// Cross-origin response headers.
    pub cors: CorsConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            upstreams: default_upstreams(),
            routes: default_routes(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            cors: CorsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Find an upstream by name.
    pub fn upstream_mut(&mut self, name: &str) -> Option<&mut UpstreamConfig> {
        self.upstreams.iter_mut().find(|u| u.name == name)
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

/// An origin the gateway forwards to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Identifier referenced by routes.
    pub name: String,

    /// Base URL (e.g., "http://127.0.0.1:8081").
    pub url: String,
}

/// Whether a route requires a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Protected,
}

/// Route configuration mapping (method, path) to an upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// HTTP method (e.g., "GET").
    pub method: String,

    /// Path pattern; `:name` segments match any single segment.
    pub path: String,

    pub access: Access,

    /// Upstream name to forward to.
    pub upstream: String,
}

impl RouteConfig {
    pub fn new(method: &str, path: &str, access: Access, upstream: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            access,
            upstream: upstream.to_string(),
        }
    }
}

fn default_upstreams() -> Vec<UpstreamConfig> {
    vec![
        UpstreamConfig {
            name: "users".to_string(),
            url: "http://localhost:8081".to_string(),
        },
        UpstreamConfig {
            name: "orders".to_string(),
            url: "http://localhost:8082".to_string(),
        },
    ]
}

/// The fixed `/v1` namespace.
pub fn default_routes() -> Vec<RouteConfig> {
    use Access::{Protected, Public};

    vec![
        RouteConfig::new("POST", "/v1/users/register", Public, "users"),
        RouteConfig::new("POST", "/v1/users/login", Public, "users"),
        RouteConfig::new("GET", "/v1/users/me", Protected, "users"),
        RouteConfig::new("PATCH", "/v1/users/me", Protected, "users"),
        RouteConfig::new("GET", "/v1/users", Protected, "users"),
        RouteConfig::new("POST", "/v1/orders", Protected, "orders"),
        RouteConfig::new("GET", "/v1/orders", Protected, "orders"),
        RouteConfig::new("GET", "/v1/orders/:id", Protected, "orders"),
        RouteConfig::new("PATCH", "/v1/orders/:id/status", Protected, "orders"),
        RouteConfig::new("POST", "/v1/orders/:id/cancel", Protected, "orders"),
        RouteConfig::new("DELETE", "/v1/orders/:id", Protected, "orders"),
    ]
}

/// Bearer token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HMAC secret.
    pub jwt_secret: String,

    /// The single accepted signing algorithm.
    pub algorithm: Algorithm,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            jwt_secret: "dev-secret-change-me".to_string(),
            algorithm: Algorithm::HS256,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per client per window.
    pub capacity: u32,

    /// Fixed window length in milliseconds.
    pub window_ms: u64,

    /// Buckets idle longer than this are evicted.
    pub idle_ttl_secs: u64,

    /// How often the eviction sweep runs.
    pub sweep_interval_secs: u64,

    /// Peers allowed to supply the client address via X-Forwarded-For.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10,
            window_ms: 1000,
            idle_ttl_secs: 60,
            sweep_interval_secs: 30,
            trusted_proxies: Vec::new(),
        }
    }
}

/// Outbound timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Time allowed until the origin's response head arrives, in milliseconds.
    pub request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            request_ms: 30_000,
        }
    }
}

/// Access-control headers added to every response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        Self {
            allow_origin: "*".to_string(),
            allow_methods: owned(&["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]),
            allow_headers: owned(&[
                "Origin",
                "Content-Type",
                "Accept",
                "Authorization",
                "X-Requested-With",
                "X-Request-ID",
            ]),
            expose_headers: owned(&["X-Request-ID"]),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive used when RUST_LOG is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "edge_gateway=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
