//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (subscriber setup for structured events)
//!     → access_log.rs (one record per request, after the chain completes)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems via the request span
//! - Metrics are cheap (atomic increments) and no-ops until a recorder is installed

pub mod access_log;
#[cfg(test)]
pub(crate) mod capture;
pub mod logging;
pub mod metrics;

pub use access_log::AccessLog;
