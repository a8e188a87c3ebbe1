//! Reverse-proxy forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the routed origin
//! - Copy end-to-end headers, stamp the correlation id last
//! - Stream bodies in both directions without buffering
//! - Map transport failures to `UPSTREAM_ERROR`
//!
//! # Design Decisions
//! - One attempt per request, no retries
//! - Connect timeout lives on the connector; the wait for the response
//!   head is a `tokio::time::timeout` around the call
//! - The relayed response body is cut off once the origin has sent nothing
//!   for `request_ms`, so a stalled origin cannot pin the connection
//! - Transport error text is logged, never returned to the client

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Body,
    http::{
        header::{
            HeaderName, CONNECTION, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER,
            TRANSFER_ENCODING, UPGRADE,
        },
        HeaderMap, Request,
    },
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use hyper::body::{Body as HttpBody, Bytes, Frame, SizeHint};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::TimeoutConfig;
use crate::error::GatewayError;
use crate::http::pipeline::{Endpoint, RequestContext};
use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::observability::metrics;
use crate::routing::Upstream;

/// Headers meaningful only for a single transport hop.
static HOP_BY_HOP: [HeaderName; 8] = [
    CONNECTION,
    HeaderName::from_static("keep-alive"),
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// The origin stopped sending body data mid-response.
#[derive(Debug, thiserror::Error)]
#[error("upstream body idle for {0:?}")]
pub struct BodyIdleTimeout(Duration);

/// Response body relay that fails once no frame arrives within `idle`.
///
/// The deadline restarts on every frame. On expiry the stream ends with an
/// error, which aborts the client response instead of leaving it hanging.
pub struct IdleTimeoutBody<B> {
    inner: Pin<Box<B>>,
    idle: Duration,
    deadline: Pin<Box<tokio::time::Sleep>>,
    upstream: Arc<Upstream>,
    expired: bool,
}

impl<B> IdleTimeoutBody<B> {
    pub fn new(inner: B, idle: Duration, upstream: Arc<Upstream>) -> Self {
        Self {
            inner: Box::pin(inner),
            idle,
            deadline: Box::pin(tokio::time::sleep(idle)),
            upstream,
            expired: false,
        }
    }
}

impl<B> HttpBody for IdleTimeoutBody<B>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<axum::BoxError>,
{
    type Data = Bytes;
    type Error = axum::BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        let this = self.get_mut();
        if this.expired {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(frame) => {
                if matches!(frame, Some(Ok(_))) {
                    let next = tokio::time::Instant::now() + this.idle;
                    this.deadline.as_mut().reset(next);
                }
                Poll::Ready(frame.map(|result| result.map_err(Into::into)))
            }
            Poll::Pending => {
                if this.deadline.as_mut().poll(cx).is_pending() {
                    return Poll::Pending;
                }
                this.expired = true;
                tracing::error!(
                    upstream = %this.upstream.name,
                    idle_ms = this.idle.as_millis() as u64,
                    "Upstream body stalled, aborting response"
                );
                metrics::record_upstream_error(&this.upstream.name);
                Poll::Ready(Some(Err(Box::new(BodyIdleTimeout(this.idle)))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.expired || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Terminal endpoint forwarding to the routed upstream.
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(timeouts.connect_ms)));
        connector.set_nodelay(true);

        Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            request_timeout: Duration::from_millis(timeouts.request_ms),
        }
    }
}

impl Endpoint for Forwarder {
    fn serve<'a>(&'a self, req: Request<Body>, ctx: &'a mut RequestContext) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let Some(route) = ctx.route.clone() else {
                return GatewayError::NotFound.into_response();
            };
            let upstream = &route.upstream;
            let request_id = ctx.request_id.clone().unwrap_or_else(RequestId::generate);

            let (parts, body) = req.into_parts();
            let uri = match upstream.target_uri(&parts.uri) {
                Ok(uri) => uri,
                Err(e) => {
                    tracing::error!(upstream = %upstream.name, error = %e, "Invalid target URL");
                    return GatewayError::Config.into_response();
                }
            };

            let mut headers = parts.headers;
            strip_hop_by_hop(&mut headers);
            headers.remove(HOST);
            headers.insert(X_REQUEST_ID, request_id.header_value());

            let mut outbound = match Request::builder().method(parts.method).uri(uri).body(body) {
                Ok(req) => req,
                Err(e) => {
                    tracing::error!(upstream = %upstream.name, error = %e, "Failed to build proxied request");
                    return GatewayError::Proxy.into_response();
                }
            };
            *outbound.headers_mut() = headers;

            tracing::debug!(upstream = %upstream.name, target = %outbound.uri(), "Forwarding request");

            match tokio::time::timeout(self.request_timeout, self.client.request(outbound)).await {
                Ok(Ok(response)) => {
                    let (mut parts, incoming) = response.into_parts();
                    strip_hop_by_hop(&mut parts.headers);
                    let body = IdleTimeoutBody::new(incoming, self.request_timeout, upstream.clone());
                    Response::from_parts(parts, Body::new(body))
                }
                Ok(Err(e)) => {
                    tracing::error!(upstream = %upstream.name, error = %e, "Upstream request failed");
                    metrics::record_upstream_error(&upstream.name);
                    GatewayError::Upstream.into_response()
                }
                Err(_) => {
                    tracing::error!(
                        upstream = %upstream.name,
                        timeout_ms = self.request_timeout.as_millis() as u64,
                        "Upstream request timed out"
                    );
                    metrics::record_upstream_error(&upstream.name);
                    GatewayError::Upstream.into_response()
                }
            }
        })
    }
}
