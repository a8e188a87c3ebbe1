//! Ordered request pipeline.
//!
//! # Data Flow
//! ```text
//! Request + RequestContext
//!     → stage[0].handle(req, ctx, next)
//!         → stage[1].handle(req, ctx, next)
//!             → ...
//!                 → endpoint.serve(req, ctx)
//!     ← Response (each stage may short-circuit or post-process)
//! ```
//!
//! # Design Decisions
//! - Stages are an explicit `Vec`, composition is sequential application
//! - Request-scoped state lives in a typed `RequestContext`, not in extensions
//! - A `Pipeline` is itself an `Endpoint`, so route groups nest pipelines
//! - A panic is contained where it happens: the caller of the panicking
//!   stage receives `INTERNAL_ERROR` and post-processes it as usual

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::{BoxFuture, FutureExt};

use crate::error::{panic_detail, GatewayError};
use crate::http::request::RequestId;
use crate::routing::router::Route;
use crate::security::token::Claims;

/// State carried alongside one request through the pipeline.
#[derive(Debug, Default)]
pub struct RequestContext {
    /// Peer address of the inbound connection.
    pub client_addr: Option<SocketAddr>,
    /// Set by the correlation stage.
    pub request_id: Option<RequestId>,
    /// Set by the route dispatcher.
    pub route: Option<Arc<Route>>,
    /// Set by the authenticator on protected routes.
    pub claims: Option<Claims>,
}

impl RequestContext {
    pub fn new(client_addr: Option<SocketAddr>) -> Self {
        Self {
            client_addr,
            ..Self::default()
        }
    }

    /// Upstream name for logs and metrics, once routed.
    pub fn upstream_name(&self) -> &str {
        self.route
            .as_ref()
            .map(|route| route.upstream.name.as_str())
            .unwrap_or("none")
    }
}

/// One step of the chain.
pub trait Stage: Send + Sync {
    /// Short identifier used in startup logs.
    fn name(&self) -> &'static str;

    /// Handle the request, either answering it or delegating to `next`.
    fn handle<'a>(
        &'a self,
        req: Request<Body>,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// Terminal handler at the end of a chain.
pub trait Endpoint: Send + Sync {
    fn serve<'a>(&'a self, req: Request<Body>, ctx: &'a mut RequestContext) -> BoxFuture<'a, Response>;
}

/// The remainder of the chain after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    /// Run the remaining stages and the endpoint.
    pub fn run<'b>(self, req: Request<Body>, ctx: &'b mut RequestContext) -> BoxFuture<'b, Response>
    where
        'a: 'b,
    {
        let (name, fut) = match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    endpoint: self.endpoint,
                };
                (stage.name(), stage.handle(req, ctx, next))
            }
            None => ("endpoint", self.endpoint.serve(req, ctx)),
        };

        AssertUnwindSafe(fut)
            .catch_unwind()
            .map(move |result| {
                result.unwrap_or_else(|payload| {
                    tracing::error!(stage = name, panic = panic_detail(payload.as_ref()), "Stage panicked");
                    GatewayError::Internal.into_response()
                })
            })
            .boxed()
    }
}

/// An immutable, ordered list of stages in front of an endpoint.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    endpoint: Arc<dyn Endpoint>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    /// Push a request through every stage in order.
    pub fn dispatch<'a>(&'a self, req: Request<Body>, ctx: &'a mut RequestContext) -> BoxFuture<'a, Response> {
        Next {
            stages: &self.stages,
            endpoint: self.endpoint.as_ref(),
        }
        .run(req, ctx)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }
}

impl Endpoint for Pipeline {
    fn serve<'a>(&'a self, req: Request<Body>, ctx: &'a mut RequestContext) -> BoxFuture<'a, Response> {
        self.dispatch(req, ctx)
    }
}

pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    /// Append a stage; stages run in insertion order.
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn build(self, endpoint: Arc<dyn Endpoint>) -> Pipeline {
        Pipeline {
            stages: self.stages,
            endpoint,
        }
    }
}
