//! Per-client fixed-window rate limiting.
//!
//! # Responsibilities
//! - Track one bucket per client address
//! - Admit up to `capacity` requests per window, reject the rest with 429
//! - Evict buckets that have gone idle
//!
//! # Design Decisions
//! - Fixed window: a bucket older than the window is refilled to full
//!   capacity on the next check; tokens never trickle back
//! - The read-check-mutate runs under the bucket's shard lock (DashMap
//!   `entry`), so checks on one key are linearized while unrelated keys
//!   proceed in parallel
//! - A rejected request does not consume a token
//! - The limiter is an owned component handed to the stage, never a global

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::config::RateLimitConfig;
use crate::error::GatewayError;
use crate::http::pipeline::{Next, RequestContext, Stage};
use crate::observability::metrics;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        /// Tokens left in the current window.
        remaining: u32,
    },
    Denied {
        /// Time until the current window ends.
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: u32,
    window_start: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: capacity,
            window_start: now,
            last_seen: now,
        }
    }
}

/// Table of per-client buckets.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<IpAddr, Bucket>,
    capacity: u32,
    window: Duration,
    idle_ttl: Duration,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration, idle_ttl: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
            window,
            idle_ttl,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.capacity,
            Duration::from_millis(config.window_ms),
            Duration::from_secs(config.idle_ttl_secs),
        )
    }

    pub fn check(&self, key: IpAddr) -> Decision {
        self.check_at(key, Instant::now())
    }

    /// Check against an explicit clock reading.
    pub fn check_at(&self, key: IpAddr, now: Instant) -> Decision {
        let mut bucket = self
            .buckets
            .entry(key)
            .or_insert_with(|| Bucket::full(self.capacity, now));

        if now.saturating_duration_since(bucket.window_start) > self.window {
            *bucket = Bucket::full(self.capacity, now);
        }
        bucket.last_seen = now;

        if bucket.tokens == 0 {
            let window_end = bucket.window_start + self.window;
            return Decision::Denied {
                retry_after: window_end.saturating_duration_since(now),
            };
        }

        bucket.tokens -= 1;
        Decision::Allowed {
            remaining: bucket.tokens,
        }
    }

    /// Drop buckets idle for longer than the TTL; returns how many went.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= self.idle_ttl);
        before.saturating_sub(self.buckets.len())
    }

    /// Number of tracked client keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Periodically evict idle buckets until shutdown is signalled.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.evict_idle();
                    let remaining = self.len();
                    metrics::record_bucket_count(remaining);
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining, "Evicted idle rate limit buckets");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    }
}

/// Resolve the rate-limit key for a request.
///
/// The peer address is used unless the peer is a trusted proxy, in which
/// case the first parseable `X-Forwarded-For` entry wins.
pub fn client_ip(peer: Option<SocketAddr>, headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> IpAddr {
    let peer_ip = peer
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !trusted_proxies.contains(&peer_ip) {
        return peer_ip;
    }

    headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|entry| entry.trim().parse::<IpAddr>().ok())
        .unwrap_or(peer_ip)
}

/// Pipeline stage enforcing the limiter.
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    trusted_proxies: Vec<IpAddr>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>, trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            limiter,
            trusted_proxies,
        }
    }
}

impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn handle<'a>(
        &'a self,
        req: Request<Body>,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let key = client_ip(ctx.client_addr, req.headers(), &self.trusted_proxies);

            match self.limiter.check(key) {
                Decision::Allowed { .. } => next.run(req, ctx).await,
                Decision::Denied { retry_after } => {
                    tracing::warn!(client = %key, retry_after_ms = retry_after.as_millis() as u64, "Rate limit exceeded");
                    metrics::record_rate_limited();
                    GatewayError::RateLimitExceeded { retry_after }.into_response()
                }
            }
        })
    }
}
