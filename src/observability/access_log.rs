//! Per-request access log.
//!
//! Wraps the rest of the chain and emits exactly one record once it has
//! produced a response, including responses from stages that short-circuit.
//! Severity follows the status class: info for 1xx-3xx, warn for 4xx,
//! error for 5xx.

use std::time::Instant;

use axum::{body::Body, http::Request, response::Response};
use futures_util::future::BoxFuture;

use crate::http::pipeline::{Next, RequestContext, Stage};
use crate::observability::metrics;

#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLog;

impl Stage for AccessLog {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn handle<'a>(
        &'a self,
        req: Request<Body>,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().clone();
            let path = req.uri().path().to_string();

            let response = next.run(req, ctx).await;

            let status = response.status();
            let duration_ms = start.elapsed().as_millis() as u64;
            let request_id = ctx.request_id.as_ref().map(|id| id.as_str()).unwrap_or_default();
            let request_id: &str = &request_id;
            let upstream = ctx.upstream_name();

            if status.is_server_error() {
                tracing::error!(
                    request_id,
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    duration_ms,
                    upstream,
                    "Request completed"
                );
            } else if status.is_client_error() {
                tracing::warn!(
                    request_id,
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    duration_ms,
                    upstream,
                    "Request completed"
                );
            } else {
                tracing::info!(
                    request_id,
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    duration_ms,
                    upstream,
                    "Request completed"
                );
            }

            metrics::record_request(method.as_str(), status.as_u16(), upstream, start);
            response
        })
    }
}
