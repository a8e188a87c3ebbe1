//! Protocol-level pipeline stages that are not tied to security policy.

pub mod cors;

pub use cors::Cors;
