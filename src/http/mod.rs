//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, peer address, panic guard)
//!     → pipeline.rs (ordered stages over a typed RequestContext)
//!         → request.rs (correlation id)
//!         → middleware/ (CORS)
//!         → [security + routing stages]
//!     → proxy.rs (forward to origin, stream back)
//!     → response.rs (envelopes for gateway-generated answers)
//!     → Send to client
//! ```

pub mod middleware;
pub mod pipeline;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{Endpoint, Next, Pipeline, RequestContext, Stage};
pub use request::{Correlation, RequestId, X_REQUEST_ID};
pub use server::HttpServer;
