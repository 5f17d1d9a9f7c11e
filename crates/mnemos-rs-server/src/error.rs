//! HTTP error mapping for memory operations.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{error, warn};
use mnemos_rs_memory::{ErrorKind, MemoryError};
use serde_json::json;

/// Error returned by route handlers.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub MemoryError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::EmbeddingUnavailable | ErrorKind::StoreUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::PartialWrite
            | ErrorKind::Configuration
            | ErrorKind::DimensionMismatch => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Stable label for an error kind in response bodies.
pub fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Configuration => "configuration",
        ErrorKind::Validation => "validation",
        ErrorKind::EmbeddingUnavailable => "embedding_unavailable",
        ErrorKind::StoreUnavailable => "store_unavailable",
        ErrorKind::DimensionMismatch => "dimension_mismatch",
        ErrorKind::PartialWrite => "partial_write",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            if self.0.is_retryable() {
                warn!("request failed (status={}, error={})", status.as_u16(), self.0);
            } else {
                error!("request failed (status={}, error={})", status.as_u16(), self.0);
            }
        }
        let mut body = json!({
            "error": self.0.to_string(),
            "kind": kind_label(self.0.kind()),
            "retryable": self.0.is_retryable(),
        });
        if self.0.kind() == ErrorKind::PartialWrite {
            body["persisted_ids"] = json!(self.0.persisted_ids());
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_to_status_codes() {
        let cases = [
            (MemoryError::validation("user_id", "required"), 400),
            (MemoryError::store("down"), 503),
            (MemoryError::embedding("down"), 503),
            (
                MemoryError::DimensionMismatch {
                    expected: 8,
                    actual: 3,
                },
                500,
            ),
            (MemoryError::configuration("chunk_size", "zero"), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status_code().as_u16(), status);
        }
    }
}
