//! Response envelopes.
//!
//! # Responsibilities
//! - Define the JSON envelope shared by the gateway and its origins
//! - Render terminal error responses for short-circuited requests
//!
//! # Design Decisions
//! - Field names are part of the public contract (`success`, `data`, `error`)
//! - The gateway only emits failure envelopes; success bodies come from origins
//!   and are relayed untouched

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Machine-readable error detail carried by a failure envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// `{"success": false, "error": {...}}`
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub success: bool,
    pub error: ErrorBody,
}

/// Either envelope, as read back by clients:
/// `{"success": true, "data": ...}` or `{"success": false, "error": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

/// Build a failure envelope response.
pub fn failure(status: StatusCode, code: &str, message: &str) -> Response {
    let body = Failure {
        success: false,
        error: ErrorBody {
            code: code.to_string(),
            message: message.to_string(),
        },
    };
    (status, Json(body)).into_response()
}
