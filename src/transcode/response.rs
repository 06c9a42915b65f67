//! RPC → HTTP response transcoding.
//!
//! # Status Mapping
//! ```text
//! OK                 → 200 (201 for create)
//! NOT_FOUND          → 404
//! INVALID_ARGUMENT   → 400
//! PERMISSION_DENIED  → 403
//! UNAVAILABLE        → 503
//! DEADLINE_EXCEEDED  → 504
//! anything else      → 502
//! ```
//! 500 is reserved for failures inside the gateway itself.

use axum::http::StatusCode;
use serde_json::{json, Value};
use tonic::{Code, Status};

use crate::routing::catalog::Operation;

/// HTTP status for a backend status code.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Backend messages for these codes describe the caller's request and are passed on.
fn message_is_safe(code: Code) -> bool {
    matches!(
        code,
        Code::NotFound
            | Code::InvalidArgument
            | Code::PermissionDenied
            | Code::AlreadyExists
            | Code::FailedPrecondition
            | Code::OutOfRange
    )
}

fn generic_message(code: Code) -> &'static str {
    match code {
        Code::NotFound => "not found",
        Code::InvalidArgument => "invalid argument",
        Code::PermissionDenied => "permission denied",
        Code::Unavailable => "service unavailable",
        Code::DeadlineExceeded => "upstream deadline exceeded",
        _ => "upstream error",
    }
}

/// Status and caller-facing message for a backend failure.
pub fn map_status(status: &Status) -> (StatusCode, String) {
    let code = status.code();
    let message = if message_is_safe(code) && !status.message().is_empty() {
        status.message().to_string()
    } else {
        generic_message(code).to_string()
    };
    (http_status(code), message)
}

/// Success status for an operation.
pub fn success_status(op: Operation) -> StatusCode {
    match op {
        Operation::Create => StatusCode::CREATED,
        _ => StatusCode::OK,
    }
}

/// Convert a backend result into an HTTP status and JSON body.
pub fn to_http_response(op: Operation, result: Result<Value, Status>) -> (StatusCode, Value) {
    match result {
        Ok(payload) => (success_status(op), payload),
        Err(status) => {
            let (code, message) = map_status(&status);
            (code, json!({ "error": message }))
        }
    }
}
