//! Bearer-token authentication for protected routes.
//!
//! Verifies the `Authorization` header and attaches the claims to the
//! request context. Authorization by role is left to the origins; the
//! header itself is forwarded unchanged.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;

use crate::error::GatewayError;
use crate::http::pipeline::{Next, RequestContext, Stage};
use crate::observability::metrics;
use crate::security::token::TokenVerifier;

pub struct Authenticator {
    verifier: TokenVerifier,
}

impl Authenticator {
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }
}

impl Stage for Authenticator {
    fn name(&self) -> &'static str {
        "authenticator"
    }

    fn handle<'a>(
        &'a self,
        req: Request<Body>,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let verified = self.verifier.verify_header(req.headers().get(AUTHORIZATION));
            match verified {
                Ok(claims) => {
                    tracing::debug!(user_id = %claims.user_id, "Token verified");
                    ctx.claims = Some(claims);
                    next.run(req, ctx).await
                }
                Err(err) => {
                    // Raw verification detail stays in the server log.
                    tracing::warn!(path = %req.uri().path(), error = %err, "Authentication failed");
                    let err = GatewayError::from(err);
                    metrics::record_auth_failure(err.code());
                    err.into_response()
                }
            }
        })
    }
}
