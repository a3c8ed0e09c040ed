//! Server error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Errors raised while serving or minting credentials.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Request lacks a room name.
    #[error("Room name is required")]
    MissingRoomName,

    /// Signing settings are incomplete.
    #[error("missing signing configuration: {}", missing.join(", "))]
    Configuration {
        /// Setting names that are absent or empty.
        missing: Vec<&'static str>,
    },

    /// Request body is not the expected JSON.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// JWT encoding or decoding failed.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// The metrics recorder could not be installed.
    #[error("metrics recorder: {0}")]
    Metrics(String),

    /// Socket or runtime failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingRoomName => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed to HTTP clients. Internal detail stays in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingRoomName => "Room name is required",
            Self::Configuration { .. } => "Server configuration error",
            _ => "Failed to generate token",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}
