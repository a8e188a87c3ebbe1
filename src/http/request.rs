//! Request correlation.
//!
//! # Responsibilities
//! - Adopt the caller's `X-Request-ID` or generate a UUID v4
//! - Run the rest of the chain inside a span carrying the id
//! - Echo the id on the response
//!
//! # Design Decisions
//! - Trust-the-caller: a non-empty inbound id is reused verbatim
//! - Request ID assigned as early as possible for tracing
//! - The response header is overwritten, so it always equals the pipeline's id

use std::borrow::Cow;
use std::fmt;

use axum::{
    body::Body,
    http::{header::HeaderName, HeaderMap, HeaderValue, Request},
    response::Response,
};
use futures_util::future::BoxFuture;
use tracing::Instrument;
use uuid::Uuid;

use crate::http::pipeline::{Next, RequestContext, Stage};

/// Correlation header name.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request correlation identifier.
///
/// Always holds a valid header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(HeaderValue);

impl RequestId {
    /// Generate a fresh UUID v4 id.
    pub fn generate() -> Self {
        let id = Uuid::new_v4().to_string();
        Self(HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("invalid")))
    }

    /// Adopt the first non-empty `X-Request-ID` from the headers, byte for byte.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(&X_REQUEST_ID)
            .filter(|value| !value.is_empty())
            .cloned()
            .map(Self)
    }

    /// Text form for log fields; non-UTF-8 bytes are replaced.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.0.as_bytes())
    }

    pub fn header_value(&self) -> HeaderValue {
        self.0.clone()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// Pipeline entry stage assigning the correlation id.
#[derive(Debug, Default, Clone, Copy)]
pub struct Correlation;

impl Stage for Correlation {
    fn name(&self) -> &'static str {
        "correlation"
    }

    fn handle<'a>(
        &'a self,
        req: Request<Body>,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let request_id = RequestId::from_headers(req.headers()).unwrap_or_else(RequestId::generate);
            ctx.request_id = Some(request_id.clone());

            let span = tracing::info_span!("request", request_id = %request_id);
            let mut response = next.run(req, ctx).instrument(span).await;

            response
                .headers_mut()
                .insert(X_REQUEST_ID, request_id.header_value());
            response
        })
    }
}
