//! Error types for the pdfink server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdfink_core::PdfInkError;
use serde::Serialize;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to parse PDF: {0}")]
    MalformedInput(String),

    #[error("Invalid annotation #{index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("No PDF file supplied")]
    EmptyInput,

    #[error("Render timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl ServerError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::MalformedInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "MALFORMED_INPUT"),
            ServerError::InvalidRecord { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_RECORD")
            }
            ServerError::EmptyInput => (StatusCode::BAD_REQUEST, "EMPTY_INPUT"),
            ServerError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "TIMEOUT"),
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<PdfInkError> for ServerError {
    fn from(err: PdfInkError) -> Self {
        match err {
            PdfInkError::MalformedInput(msg) => ServerError::MalformedInput(msg),
            PdfInkError::InvalidRecord { index, reason } => {
                ServerError::InvalidRecord { index, reason }
            }
            PdfInkError::EmptyInput => ServerError::EmptyInput,
            PdfInkError::InvalidPage { .. } | PdfInkError::SerializationError(_) => {
                ServerError::InvalidRequest(err.to_string())
            }
            PdfInkError::OperationError(msg) => ServerError::Internal(msg),
        }
    }
}
