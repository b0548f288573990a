//! Tool catalog for conversations.
//!
//! Tools are registered once at startup from a declarative table and the
//! catalog is read-only afterwards. A single tool failing to build is
//! collected into the startup report and skipped; it never aborts startup
//! or disables the other tools.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How a tool executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    /// The handle runs synchronously on a worker thread.
    Blocking,
    /// The handle suspends and must be driven by an executor.
    Suspending,
}

/// A tool whose handle runs synchronously.
pub trait BlockingTool: Send + Sync {
    /// Invokes the tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability fails.
    fn invoke(&self, args: JsonValue) -> Result<JsonValue, ToolError>;
}

/// A tool whose handle suspends.
#[async_trait]
pub trait SuspendingTool: Send + Sync {
    /// Invokes the tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability fails.
    async fn invoke(&self, args: JsonValue) -> Result<JsonValue, ToolError>;
}

/// The executable handle of a registered tool.
#[derive(Clone)]
pub enum ToolHandle {
    /// Synchronous handle.
    Blocking(Arc<dyn BlockingTool>),
    /// Suspending handle.
    Suspending(Arc<dyn SuspendingTool>),
}

impl ToolHandle {
    /// Returns the execution mode this handle declares.
    #[must_use]
    pub fn mode(&self) -> ToolMode {
        match self {
            Self::Blocking(_) => ToolMode::Blocking,
            Self::Suspending(_) => ToolMode::Suspending,
        }
    }
}

impl fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking(_) => write!(f, "ToolHandle::Blocking(..)"),
            Self::Suspending(_) => write!(f, "ToolHandle::Suspending(..)"),
        }
    }
}

/// A registered tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Unique tool id.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Fixed phrases that trigger this tool from a user message.
    pub triggers: Vec<String>,
    /// The executable handle.
    pub handle: ToolHandle,
}

impl ToolSpec {
    /// Returns the tool's execution mode.
    #[must_use]
    pub fn mode(&self) -> ToolMode {
        self.handle.mode()
    }
}

/// One row of the declarative registration table.
///
/// The handle side carries the outcome of constructing the capability, so
/// a failing constructor lands in the startup report instead of aborting
/// startup.
pub struct ToolRow {
    /// Unique tool id.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Fixed trigger phrases.
    pub triggers: Vec<String>,
    /// The constructed handle, or the construction failure.
    pub handle: Result<ToolHandle, ToolError>,
}

impl ToolRow {
    /// Creates a row for a blocking tool.
    #[must_use]
    pub fn blocking(
        id: impl Into<String>,
        description: impl Into<String>,
        triggers: &[&str],
        tool: Arc<dyn BlockingTool>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            triggers: triggers.iter().map(|t| (*t).to_string()).collect(),
            handle: Ok(ToolHandle::Blocking(tool)),
        }
    }

    /// Creates a row for a suspending tool.
    #[must_use]
    pub fn suspending(
        id: impl Into<String>,
        description: impl Into<String>,
        triggers: &[&str],
        tool: Arc<dyn SuspendingTool>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            triggers: triggers.iter().map(|t| (*t).to_string()).collect(),
            handle: Ok(ToolHandle::Suspending(tool)),
        }
    }

    /// Creates a row from a fallible constructor outcome.
    #[must_use]
    pub fn from_result(
        id: impl Into<String>,
        description: impl Into<String>,
        triggers: &[&str],
        handle: Result<ToolHandle, ToolError>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            triggers: triggers.iter().map(|t| (*t).to_string()).collect(),
            handle,
        }
    }
}

/// A registration that did not make it into the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    /// The offending tool id.
    pub id: String,
    /// Why registration failed.
    pub reason: String,
}

/// Outcome of building the tool catalog at startup.
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    /// Ids registered successfully, in registration order.
    pub registered: Vec<String>,
    /// Registrations that were skipped.
    pub failures: Vec<RegistrationFailure>,
}

impl StartupReport {
    /// Returns true if every row registered.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Registry of available tools.
///
/// Immutable after construction; iteration follows registration order,
/// which the trigger policy relies on for first-match-wins selection.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: Vec<ToolSpec>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Builds the catalog from a declarative table, validating eagerly.
    ///
    /// Invalid rows (failed constructor, empty or duplicate id) are
    /// collected into the report and skipped.
    #[must_use]
    pub fn from_rows(rows: Vec<ToolRow>) -> (Self, StartupReport) {
        let mut registry = Self::default();
        let mut report = StartupReport::default();

        for row in rows {
            let handle = match row.handle {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::warn!(tool = %row.id, error = %e, "skipping tool registration");
                    report.failures.push(RegistrationFailure {
                        id: row.id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if row.id.is_empty() {
                tracing::warn!("skipping tool registration with empty id");
                report.failures.push(RegistrationFailure {
                    id: row.id,
                    reason: "tool id must not be empty".to_string(),
                });
                continue;
            }

            if registry.index.contains_key(&row.id) {
                tracing::warn!(tool = %row.id, "skipping duplicate tool registration");
                report.failures.push(RegistrationFailure {
                    id: row.id,
                    reason: "duplicate tool id".to_string(),
                });
                continue;
            }

            report.registered.push(row.id.clone());
            registry.index.insert(row.id.clone(), registry.entries.len());
            registry.entries.push(ToolSpec {
                id: row.id,
                description: row.description,
                triggers: row.triggers,
                handle,
            });
        }

        (registry, report)
    }

    /// Gets a tool by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ToolSpec> {
        self.index.get(id).map(|i| &self.entries[*i])
    }

    /// Iterates tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.entries.iter()
    }

    /// Returns all tool ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|t| t.id.as_str()).collect()
    }

    /// Returns (id, description) pairs in registration order.
    pub fn descriptions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|t| (t.id.as_str(), t.description.as_str()))
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
