// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON error bodies for the management API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nexus_core::{ErrorKind, NexusError};
use serde::Serialize;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    /// Whether the same call may succeed if repeated unchanged.
    pub retryable: bool,
}

/// A [`NexusError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub NexusError);

impl From<NexusError> for ApiError {
    fn from(e: NexusError) -> Self {
        Self(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ConfigurationError => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AuthError => StatusCode::BAD_GATEWAY,
        ErrorKind::TransientError => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::PermanentError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::CredentialUnavailable
        | ErrorKind::NormalizationError
        | ErrorKind::StorageError
        | ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!(kind = %kind, error = %self.0, "management request failed");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind,
            retryable: kind.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

/// Shorthand for a 400 on malformed request input.
pub fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError(NexusError::Config(message.into()))
}
