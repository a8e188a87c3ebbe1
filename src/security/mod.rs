//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client fixed window, every route)
//!     → [routing decides public or protected]
//!     → auth.rs (bearer token, protected routes only)
//!         → token.rs (HMAC JWT verification)
//!     → Pass to forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input (forwarded addresses only from trusted proxies)
//! - Rejections carry a stable code, never verifier internals

pub mod auth;
pub mod rate_limit;
pub mod token;

pub use auth::Authenticator;
pub use rate_limit::{RateLimit, RateLimiter};
pub use token::{Claims, TokenSigner, TokenVerifier};
