//! Error and media response encoding.

use axum::Json;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::{debug, error};

use crate::error::TagplayError;
use crate::media::MediaResponse;

impl TagplayError {
    /// HTTP status for this error.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TagplayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, kind = self.kind(), "Request failed");
        } else {
            debug!(error = %self, kind = self.kind(), "Request rejected");
        }
        let body = serde_json::json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
            "timestamp": Utc::now(),
        });
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for MediaResponse {
    fn into_response(self) -> Response {
        let Self { plan, body } = self;
        let status = if plan.is_partial() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };

        let mut builder = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, plan.mime)
            .header(header::CONTENT_LENGTH, plan.content_length());
        if plan.accepts_ranges() {
            builder = builder.header(header::ACCEPT_RANGES, "bytes");
        }
        if let Some(range) = plan.content_range() {
            builder = builder.header(header::CONTENT_RANGE, range);
        }

        match builder.body(Body::from_stream(body)) {
            Ok(response) => response,
            Err(e) => TagplayError::Internal(e.to_string()).into_response(),
        }
    }
}
