//! Request-time error taxonomy.
//!
//! Every failure is converted into a terminal envelope response by the stage
//! that detects it. The `code` is stable; the `message` is a short hint and
//! never carries transport or signature error text.

use std::any::Any;
use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::failure;
use crate::security::token::AuthError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or malformed `Authorization` header.
    #[error("{0}")]
    AuthRequired(&'static str),

    /// Credential failed signature, algorithm, or expiry checks.
    #[error("Token is invalid or expired")]
    InvalidToken,

    #[error("Too many requests, slow down")]
    RateLimitExceeded { retry_after: Duration },

    /// Origin unreachable, reset, or timed out.
    #[error("Failed to call upstream service")]
    Upstream,

    #[error("Route not found")]
    NotFound,

    /// Outbound URI could not be assembled from the origin base.
    #[error("Invalid target URL")]
    Config,

    /// Outbound request could not be built.
    #[error("Failed to create proxied request")]
    Proxy,

    /// A stage or endpoint panicked.
    #[error("Internal server error")]
    Internal,
}

impl GatewayError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::AuthRequired(_) => "AUTH_REQUIRED",
            GatewayError::InvalidToken => "INVALID_TOKEN",
            GatewayError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            GatewayError::Upstream => "UPSTREAM_ERROR",
            GatewayError::NotFound => "NOT_FOUND",
            GatewayError::Config => "CONFIG_ERROR",
            GatewayError::Proxy => "PROXY_ERROR",
            GatewayError::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::AuthRequired(_) | GatewayError::InvalidToken => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Upstream => StatusCode::BAD_GATEWAY,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Config | GatewayError::Proxy | GatewayError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingHeader => GatewayError::AuthRequired("Missing Authorization header"),
            AuthError::MalformedHeader => {
                GatewayError::AuthRequired("Invalid Authorization header format")
            }
            AuthError::Invalid(_) | AuthError::Expired | AuthError::Signing(_) => {
                GatewayError::InvalidToken
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = failure(self.status(), self.code(), &self.to_string());
        if let GatewayError::RateLimitExceeded { retry_after } = self {
            // Whole seconds, rounded up, never zero.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}
