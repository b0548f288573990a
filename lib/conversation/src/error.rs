//! Error types for the conversation crate.
//!
//! - `StoreError`: durable-store failures, split by read/write because the
//!   two sides have different propagation rules
//! - `ToolError`: tool construction and execution failures
//! - `BridgeError`: failures of the suspend bridge itself
//! - `TurnError`: the structured outcomes surfaced at the orchestrator
//!   boundary

use std::fmt;

/// Errors from durable store operations.
///
/// Reads and writes are separate variants: a failed read degrades to an
/// empty context while a failed write must surface to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A durable query failed.
    QueryFailed { reason: String },
    /// A durable write failed.
    WriteFailed { reason: String },
}

impl StoreError {
    /// Wraps a read-side failure.
    pub fn query(reason: impl fmt::Display) -> Self {
        Self::QueryFailed {
            reason: reason.to_string(),
        }
    }

    /// Wraps a write-side failure.
    pub fn write(reason: impl fmt::Display) -> Self {
        Self::WriteFailed {
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueryFailed { reason } => write!(f, "store query failed: {reason}"),
            Self::WriteFailed { reason } => write!(f, "store write failed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from tool capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Building the tool capability failed.
    InitFailed { reason: String },
    /// The tool handle raised during execution.
    ExecutionFailed { reason: String },
}

impl ToolError {
    /// Wraps a construction failure.
    pub fn init(reason: impl fmt::Display) -> Self {
        Self::InitFailed {
            reason: reason.to_string(),
        }
    }

    /// Wraps an execution failure.
    pub fn execution(reason: impl fmt::Display) -> Self {
        Self::ExecutionFailed {
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed { reason } => write!(f, "tool initialization failed: {reason}"),
            Self::ExecutionFailed { reason } => write!(f, "tool execution failed: {reason}"),
        }
    }
}

impl std::error::Error for ToolError {}

/// Errors from the suspend bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The dedicated runtime could not be started.
    StartFailed { reason: String },
    /// The bridged work was dropped before producing a result.
    Interrupted,
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailed { reason } => {
                write!(f, "suspend bridge failed to start: {reason}")
            }
            Self::Interrupted => write!(f, "suspended work was interrupted before completion"),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Structured outcomes surfaced from the orchestrator boundary.
///
/// Every failure mode of a turn maps to exactly one of these variants;
/// nothing escapes the orchestrator as an unhandled fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// The session could not be resolved or created.
    Session { reason: String },
    /// A durable write outside the turn record failed.
    Store { reason: String },
    /// The selected tool is not in the catalog.
    ToolNotFound { tool_id: String },
    /// The selected tool ran and failed.
    Tool { tool_id: String, reason: String },
    /// The generation capability failed; no partial turn is recorded.
    Generation { reason: String },
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session { reason } => write!(f, "session resolution failed: {reason}"),
            Self::Store { reason } => write!(f, "store operation failed: {reason}"),
            Self::ToolNotFound { tool_id } => write!(f, "tool not found: {tool_id}"),
            Self::Tool { tool_id, reason } => {
                write!(f, "tool '{tool_id}' failed: {reason}")
            }
            Self::Generation { reason } => write!(f, "generation failed: {reason}"),
        }
    }
}

impl std::error::Error for TurnError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::query("connection reset");
        assert!(err.to_string().contains("query failed"));
        assert!(err.to_string().contains("connection reset"));

        let err = StoreError::write("disk full");
        assert!(err.to_string().contains("write failed"));
    }

    #[test]
    fn tool_error_display() {
        let err = ToolError::execution("timeout");
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn turn_error_display() {
        let err = TurnError::Tool {
            tool_id: "weather".to_string(),
            reason: "endpoint unreachable".to_string(),
        };
        assert!(err.to_string().contains("weather"));
        assert!(err.to_string().contains("endpoint unreachable"));
    }
}
