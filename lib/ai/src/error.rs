//! Error types for the generation crate.

use std::fmt;

/// Errors from generation backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Request to the backend failed.
    RequestFailed { reason: String },
    /// The backend answered with a non-success status.
    BackendRejected { status: u16, reason: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Invalid backend configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => {
                write!(f, "generation request failed: {reason}")
            }
            Self::BackendRejected { status, reason } => {
                write!(f, "generation backend rejected request ({status}): {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse generation response: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid generation configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for GenerationError {}
