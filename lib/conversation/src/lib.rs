//! Conversation engine for the colloquy platform.
//!
//! This crate provides:
//!
//! - **Session Directory**: one live, durable, resumable session per identity
//! - **History Store**: append-only per-session turn log with bounded context windows
//! - **Tool Registry & Dispatcher**: startup-validated tool catalog and a
//!   blocking/suspending execution bridge
//! - **Conversation Orchestrator**: composes the above to answer one turn

pub mod dispatch;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod select;
pub mod session;
pub mod tool;

pub use dispatch::{SuspendBridge, ToolDispatcher, ToolInvocationResult, ToolOutcome};
pub use error::{BridgeError, StoreError, ToolError, TurnError};
pub use history::{HistoryEntry, HistoryStore, TurnStore};
pub use orchestrator::{
    ConversationOrchestrator, HistoryView, NO_TOOL, OrchestratorSettings, RecordStatus, TurnReply,
};
pub use select::{PhraseTriggerPolicy, TriggerPolicy};
pub use session::{Identity, Session, SessionDirectory, SessionRecord, SessionStore};
pub use tool::{
    BlockingTool, RegistrationFailure, StartupReport, SuspendingTool, ToolHandle, ToolMode,
    ToolRegistry, ToolRow, ToolSpec,
};
