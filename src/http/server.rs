//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the request pipeline from validated configuration
//! - Create the Axum router that hands every request to the pipeline
//! - Convert panics escaping the pipeline into the `INTERNAL_ERROR` envelope
//! - Serve with peer addresses and graceful shutdown
//! - Run the rate-limit sweeper alongside the listener
//!
//! # Pipeline
//! ```text
//! Correlation → AccessLog → Cors → RateLimit → RouteDispatcher
//!                                                ├─ public:    Forwarder
//!                                                └─ protected: Authenticator → Forwarder
//! ```

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::{validate_config, ConfigError, GatewayConfig};
use crate::error::{panic_detail, GatewayError};
use crate::http::middleware::Cors;
use crate::http::pipeline::{Endpoint, Pipeline, RequestContext};
use crate::http::proxy::Forwarder;
use crate::http::request::Correlation;
use crate::observability::AccessLog;
use crate::routing::{RouteDispatcher, RouteTable};
use crate::security::{Authenticator, RateLimit, RateLimiter, TokenVerifier};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    limiter: Option<Arc<RateLimiter>>,
}

impl HttpServer {
    /// Validate the configuration and build the pipeline.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let (pipeline, limiter) = Self::build_pipeline(&config)?;
        let state = AppState {
            pipeline: Arc::new(pipeline),
        };

        let router = Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response));

        Ok(Self {
            router,
            config,
            limiter,
        })
    }

    fn build_pipeline(config: &GatewayConfig) -> Result<(Pipeline, Option<Arc<RateLimiter>>), ConfigError> {
        let table = RouteTable::from_config(&config.routes, &config.upstreams)?;
        let route_count = table.len();

        let forwarder: Arc<dyn Endpoint> = Arc::new(Forwarder::new(&config.timeouts));
        let verifier = TokenVerifier::new(config.auth.jwt_secret.as_bytes(), config.auth.algorithm);

        let public = Pipeline::builder().build(forwarder.clone());
        let protected = Pipeline::builder()
            .stage(Authenticator::new(verifier))
            .build(forwarder);
        let dispatcher = RouteDispatcher::new(table, public, protected);

        let mut builder = Pipeline::builder()
            .stage(Correlation)
            .stage(AccessLog)
            .stage(Cors::from_config(&config.cors)?);

        let limiter = if config.rate_limit.enabled {
            let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
            builder = builder.stage(RateLimit::new(
                limiter.clone(),
                config.rate_limit.trusted_proxies.clone(),
            ));
            Some(limiter)
        } else {
            None
        };

        let pipeline = builder.build(Arc::new(dispatcher));
        tracing::info!(
            stages = ?pipeline.stage_names(),
            routes = route_count,
            "Pipeline assembled"
        );

        Ok((pipeline, limiter))
    }

    /// The Axum router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(limiter) = self.limiter.clone() {
            let interval = Duration::from_secs(self.config.rate_limit.sweep_interval_secs);
            tokio::spawn(limiter.run_sweeper(interval, shutdown.resubscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Single entry point: every method and path goes through the pipeline.
async fn gateway_handler(State(state): State<AppState>, req: Request<Body>) -> Response {
    let client_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let mut ctx = RequestContext::new(client_addr);
    state.pipeline.dispatch(req, &mut ctx).await
}

/// Last resort for panics outside the chain; stages are guarded by `Next::run`.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(panic = panic_detail(err.as_ref()), "Request handler panicked");
    GatewayError::Internal.into_response()
}
