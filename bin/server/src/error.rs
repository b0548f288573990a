//! HTTP mapping for domain errors.
//!
//! Every caller receives a structured JSON body; the turn-level error
//! taxonomy maps onto status codes here and nowhere else.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use colloquy_conversation::TurnError;
use serde::Serialize;
use std::fmt;

/// Errors surfaced by the HTTP layer.
#[derive(Debug)]
pub enum ApiError {
    /// No identity headers on the request.
    MissingIdentity,
    /// The identity header did not parse.
    InvalidIdentity { reason: String },
    /// A turn-level failure from the orchestrator.
    Turn(TurnError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIdentity => write!(f, "missing identity headers"),
            Self::InvalidIdentity { reason } => {
                write!(f, "invalid identity header: {reason}")
            }
            Self::Turn(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        Self::Turn(e)
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    error: String,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            Self::MissingIdentity => "missing_identity",
            Self::InvalidIdentity { .. } => "invalid_identity",
            Self::Turn(TurnError::Session { .. }) => "session",
            Self::Turn(TurnError::Store { .. }) => "store",
            Self::Turn(TurnError::ToolNotFound { .. }) => "tool_not_found",
            Self::Turn(TurnError::Tool { .. }) => "tool",
            Self::Turn(TurnError::Generation { .. }) => "generation",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::MissingIdentity => StatusCode::UNAUTHORIZED,
            Self::InvalidIdentity { .. } => StatusCode::BAD_REQUEST,
            Self::Turn(TurnError::ToolNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Turn(TurnError::Tool { .. } | TurnError::Generation { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Turn(TurnError::Session { .. } | TurnError::Store { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            kind: self.kind(),
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
