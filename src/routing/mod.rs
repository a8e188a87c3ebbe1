//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (segment-wise pattern match)
//!     → Return: matched Route (access + upstream) or NotFound
//!
//! Route Compilation (at startup):
//!     RouteConfig[] + UpstreamConfig[]
//!     → Validate (no two routes can match the same request)
//!     → Compile patterns, resolve upstream URLs
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (literal and single-segment params only)
//! - Deterministic: at most one route matches any request

pub mod matcher;
pub mod router;

pub use matcher::PathPattern;
pub use router::{Route, RouteDispatcher, RouteTable, Upstream};
