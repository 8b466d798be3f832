//! Mapping from [`AutoserviceError`] to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use autoservice_shared::AutoserviceError;
use serde_json::json;
use tracing::{error, warn};

/// Body text for completion failures of the workshop agent.
pub const ASSISTANT_UNAVAILABLE: &str = "assistant temporarily unavailable";

/// Handler error: wraps the library error and renders `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    source: AutoserviceError,
    /// Shown to the client instead of the error's own text.
    public_message: Option<&'static str>,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<AutoserviceError> for ApiError {
    fn from(source: AutoserviceError) -> Self {
        Self {
            source,
            public_message: None,
        }
    }
}

impl ApiError {
    /// Keep the status of `source` but hide its text behind `message`.
    /// The full error is still logged.
    pub fn masked(source: AutoserviceError, message: &'static str) -> Self {
        Self {
            source,
            public_message: Some(message),
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.source {
            AutoserviceError::NotFound { .. } => StatusCode::NOT_FOUND,
            AutoserviceError::Validation { .. } => StatusCode::BAD_REQUEST,
            AutoserviceError::CompletionUnavailable(_) => StatusCode::BAD_GATEWAY,
            AutoserviceError::Config { .. }
            | AutoserviceError::Storage(_)
            | AutoserviceError::SearchUnavailable
            | AutoserviceError::SearchFailed(_)
            | AutoserviceError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self.source, "request failed");
        } else {
            warn!(%status, error = %self.source, "request rejected");
        }
        let message = match self.public_message {
            Some(message) => message.to_string(),
            None => self.source.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
