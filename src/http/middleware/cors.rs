//! Cross-origin negotiation.
//! Answers preflights and annotates every response.

use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_EXPOSE_HEADERS,
        },
        HeaderMap, HeaderValue, Method, Request, StatusCode,
    },
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;

use crate::config::{CorsConfig, ValidationError};
use crate::http::pipeline::{Next, RequestContext, Stage};

/// Precomputed access-control headers.
#[derive(Debug, Clone)]
pub struct Cors {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: HeaderValue,
}

impl Cors {
    /// Build the header values; reports the first field that is not a
    /// valid header value.
    pub fn from_config(config: &CorsConfig) -> Result<Self, ValidationError> {
        let value = |field: &'static str, raw: &str| {
            HeaderValue::from_str(raw).map_err(|_| ValidationError::CorsHeader { field })
        };

        Ok(Self {
            allow_origin: value("allow_origin", &config.allow_origin)?,
            allow_methods: value("allow_methods", &config.allow_methods.join(","))?,
            allow_headers: value("allow_headers", &config.allow_headers.join(","))?,
            expose_headers: value("expose_headers", &config.expose_headers.join(","))?,
        })
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, self.expose_headers.clone());
    }
}

impl Stage for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn handle<'a>(
        &'a self,
        req: Request<Body>,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let mut response = if req.method() == Method::OPTIONS {
                tracing::debug!(path = %req.uri().path(), "Answering preflight");
                StatusCode::NO_CONTENT.into_response()
            } else {
                next.run(req, ctx).await
            };
            self.apply(response.headers_mut());
            response
        })
    }
}
