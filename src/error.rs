// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::workflow::WorkflowError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::MissingInput(what) => Self::bad_request(format!("Missing {what}")),
            WorkflowError::InvalidToken => Self::unauthorized("Invalid or expired token"),
            WorkflowError::WrongPassword => Self::forbidden("Incorrect password"),
            WorkflowError::ChecksumMismatch => {
                Self::unprocessable("Checksum mismatch! Possible tampering.")
            }
            WorkflowError::DecryptionFailed(e) => {
                tracing::error!(error = %e, "Decryption failed");
                Self::internal("Decryption failed")
            }
            WorkflowError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                Self::internal("Internal storage error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CipherError;
    use crate::storage::StorageError;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let unp = ApiError::unprocessable("oops");
        assert_eq!(unp.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unp.message, "oops");
    }

    #[test]
    fn workflow_errors_map_to_statuses() {
        let cases = [
            (WorkflowError::MissingInput("file"), StatusCode::BAD_REQUEST),
            (WorkflowError::InvalidToken, StatusCode::UNAUTHORIZED),
            (WorkflowError::WrongPassword, StatusCode::FORBIDDEN),
            (WorkflowError::ChecksumMismatch, StatusCode::UNPROCESSABLE_ENTITY),
            (
                WorkflowError::DecryptionFailed(CipherError::Misaligned(3)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                WorkflowError::Storage(StorageError::NotInitialized),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let err = ApiError::from(WorkflowError::Storage(StorageError::NotFound(
            "/srv/data/uploads/secret.enc".to_string(),
        )));
        assert!(!err.message.contains("secret"));
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }
}
