//! Edge gateway library.
//!
//! A single-entry HTTP gateway: correlation, access logging, CORS, per-client
//! rate limiting, bearer-token authentication and streaming reverse proxying
//! to the users and orders services.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
