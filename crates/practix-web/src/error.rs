//! Mapping of core errors onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use practix_core::CoreError;
use serde_json::json;
use tracing::{debug, warn};

/// Error returned by every handler
///
/// Serialized as `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::CategoryNotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::InvalidSort { .. }
            | CoreError::InvalidPage { .. }
            | CoreError::InvalidFilter { .. } => StatusCode::BAD_REQUEST,
            CoreError::ServiceUnavailable { .. } | CoreError::BackingStoreTimeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<practix_types::ParamError> for ApiError {
    fn from(err: practix_types::ParamError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        }

        let body = json!({
            "error": {
                "kind": self.0.kind(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::category_not_found("x"), StatusCode::NOT_FOUND),
            (
                CoreError::InvalidSort {
                    value: "date".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (CoreError::invalid_page("page must be at least 1"), StatusCode::BAD_REQUEST),
            (
                CoreError::ServiceUnavailable {
                    operation: "list".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CoreError::InvalidConfig {
                    message: "x".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
