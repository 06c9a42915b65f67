//! Pipeline errors and the uniform JSON error envelope.
//!
//! `GatewayError` is the only error type turned into an HTTP response, so the
//! status table and `{"error": ...}` shape live in exactly one place.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::http::dispatcher::Stage;
use crate::pool::PoolError;
use crate::routing::router::RouteNotFound;
use crate::security::AuthError;
use crate::transcode::{map_status, TranscodeError};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    RouteNotFound(#[from] RouteNotFound),
    #[error("could not read request body: {message}")]
    Body { status: StatusCode, message: String },
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
    #[error(transparent)]
    BackendUnavailable(#[from] PoolError),
    #[error("upstream error: {}", .0.message())]
    Upstream(tonic::Status),
    #[error("backend did not answer within {0:?}")]
    DeadlineExceeded(Duration),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Body { status, .. } => *status,
            GatewayError::Transcode(_) => StatusCode::BAD_REQUEST,
            GatewayError::BackendUnavailable(PoolError::UnknownService(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(status) => map_status(status).0,
            GatewayError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller; never carries internal detail.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Auth(e) => e.to_string(),
            GatewayError::RouteNotFound(_) => "not found".to_string(),
            GatewayError::Body { message, .. } => message.clone(),
            GatewayError::Transcode(e) => e.to_string(),
            GatewayError::BackendUnavailable(PoolError::UnknownService(_)) => {
                "internal server error".to_string()
            }
            GatewayError::BackendUnavailable(_) => "service unavailable".to_string(),
            GatewayError::Upstream(status) => map_status(status).1,
            GatewayError::DeadlineExceeded(_) => "upstream deadline exceeded".to_string(),
            GatewayError::Internal(_) => "internal server error".to_string(),
        }
    }

    /// Pipeline stage that produced the rejection; `None` for internal failures.
    pub fn rejected_at(&self) -> Option<Stage> {
        match self {
            GatewayError::RouteNotFound(_) => Some(Stage::Routing),
            GatewayError::Auth(_) => Some(Stage::Authenticating),
            GatewayError::BackendUnavailable(_) => Some(Stage::Pooling),
            GatewayError::Body { .. } | GatewayError::Transcode(_) => {
                Some(Stage::TranscodingRequest)
            }
            GatewayError::Upstream(_) | GatewayError::DeadlineExceeded(_) => Some(Stage::Invoking),
            GatewayError::Internal(_) => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            GatewayError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal gateway error");
            }
            GatewayError::BackendUnavailable(PoolError::UnknownService(service)) => {
                tracing::error!(service = %service, "Route references a service with no endpoint");
            }
            GatewayError::Upstream(upstream) => {
                tracing::warn!(
                    code = ?upstream.code(),
                    message = %upstream.message(),
                    status = status.as_u16(),
                    "Backend returned an error"
                );
            }
            _ => tracing::debug!(error = %self, stage = ?self.rejected_at(), "Request rejected"),
        }

        let body = Json(json!({ "error": self.public_message() }));
        let mut response = (status, body).into_response();
        if matches!(self, GatewayError::Auth(_)) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::catalog::ServiceId;
    use axum::http::Method;

    #[test]
    fn test_status_table() {
        let not_found = RouteNotFound {
            method: Method::GET,
            path: "/x".into(),
        };
        let cases: Vec<(GatewayError, StatusCode)> = vec![
            (AuthError::MissingOrMalformedToken.into(), StatusCode::UNAUTHORIZED),
            (not_found.into(), StatusCode::NOT_FOUND),
            (TranscodeError::MissingField("title".into()).into(), StatusCode::BAD_REQUEST),
            (
                PoolError::Unavailable {
                    service: ServiceId::new("faq"),
                    reason: "refused".into(),
                }
                .into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::Upstream(tonic::Status::permission_denied("no")),
                StatusCode::FORBIDDEN,
            ),
            (
                GatewayError::DeadlineExceeded(Duration::from_secs(10)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                GatewayError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{}", err);
        }
    }

    #[test]
    fn test_internal_detail_hidden() {
        let err = GatewayError::Internal("index out of bounds at transcode.rs:42".into());
        assert_eq!(err.public_message(), "internal server error");

        let err: GatewayError = PoolError::Unavailable {
            service: ServiceId::new("ticket"),
            reason: "tcp connect error 10.0.0.7:50052".into(),
        }
        .into();
        assert_eq!(err.public_message(), "service unavailable");
    }

    #[test]
    fn test_rejection_stage() {
        assert_eq!(
            GatewayError::Auth(AuthError::MissingOrMalformedToken).rejected_at(),
            Some(Stage::Authenticating)
        );
        assert_eq!(
            GatewayError::DeadlineExceeded(Duration::from_millis(100)).rejected_at(),
            Some(Stage::Invoking)
        );
        assert_eq!(
            GatewayError::Transcode(TranscodeError::MalformedBody("eof".into())).rejected_at(),
            Some(Stage::TranscodingRequest)
        );
        assert_eq!(GatewayError::Internal("boom".into()).rejected_at(), None);
    }

    #[test]
    fn test_unauthorized_has_challenge() {
        let response = GatewayError::Auth(AuthError::InvalidOrExpiredToken).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
