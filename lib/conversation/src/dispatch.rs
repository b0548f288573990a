//! Tool dispatch.
//!
//! [`ToolDispatcher`] executes a tool by id and always returns a
//! structured [`ToolInvocationResult`]; an unknown id is an outcome, not a
//! fault. Blocking and suspending handles are bridged into one call
//! contract: the async path offloads blocking handles to a worker thread,
//! and the synchronous path drives suspending handles on a dedicated
//! [`SuspendBridge`] runtime.
//!
//! No cancellation or timeout is defined for tool invocation; a suspending
//! dispatch may hold its caller for the duration of the tool call.

use crate::error::{BridgeError, ToolError};
use crate::tool::{ToolHandle, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;
use std::sync::mpsc;

/// The outcome of invoking a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool ran and produced a value.
    Ok { value: JsonValue },
    /// No tool with the requested id is registered.
    NotFound,
    /// The tool ran and failed.
    Failed { reason: String },
}

/// The structured result of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    /// The requested tool id.
    pub tool_id: String,
    /// What happened.
    pub outcome: ToolOutcome,
}

impl ToolInvocationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn ok(tool_id: impl Into<String>, value: JsonValue) -> Self {
        Self {
            tool_id: tool_id.into(),
            outcome: ToolOutcome::Ok { value },
        }
    }

    /// Creates a not-found result.
    #[must_use]
    pub fn not_found(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            outcome: ToolOutcome::NotFound,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(tool_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            outcome: ToolOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    /// Returns true if the tool produced a value.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Ok { .. })
    }
}

/// A dedicated execution context for suspending work invoked from
/// synchronous callers.
///
/// The bridge owns its own runtime: it accepts a future, runs it there,
/// and parks the calling thread on a channel until the result arrives.
/// Nothing depends on ambient scheduler state, so the bridge tolerates
/// repeated calls from any number of threads without interference.
pub struct SuspendBridge {
    handle: tokio::runtime::Handle,
    runtime: Option<tokio::runtime::Runtime>,
}

impl SuspendBridge {
    /// Starts the bridge runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built.
    pub fn new() -> Result<Self, BridgeError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("suspend-bridge")
            .enable_all()
            .build()
            .map_err(|e| BridgeError::StartFailed {
                reason: e.to_string(),
            })?;

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Drives suspending work to completion, blocking the calling thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the work is dropped before producing a result
    /// (for example because it panicked).
    pub fn run<F>(&self, work: F) -> Result<F::Output, BridgeError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.handle.spawn(async move {
            let _ = tx.send(work.await);
        });
        rx.recv().map_err(|_| BridgeError::Interrupted)
    }
}

impl Drop for SuspendBridge {
    fn drop(&mut self) {
        // A plain runtime drop blocks, which is forbidden inside another
        // runtime; shut down in the background instead.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Executes tools from a registry under one call contract.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    bridge: SuspendBridge,
}

impl ToolDispatcher {
    /// Creates a dispatcher over the given catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the suspend bridge cannot be started.
    pub fn new(registry: Arc<ToolRegistry>) -> Result<Self, BridgeError> {
        Ok(Self {
            registry,
            bridge: SuspendBridge::new()?,
        })
    }

    /// Returns the catalog this dispatcher executes from.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Executes a tool by id from an async caller.
    ///
    /// Unknown ids yield [`ToolOutcome::NotFound`]; this method never
    /// fails. Blocking handles run under `spawn_blocking` so they cannot
    /// stall the async workers.
    pub async fn dispatch(&self, tool_id: &str, args: JsonValue) -> ToolInvocationResult {
        let Some(spec) = self.registry.get(tool_id) else {
            return ToolInvocationResult::not_found(tool_id);
        };

        match &spec.handle {
            ToolHandle::Suspending(tool) => {
                Self::from_invocation(tool_id, tool.invoke(args).await)
            }
            ToolHandle::Blocking(tool) => {
                let tool = Arc::clone(tool);
                match tokio::task::spawn_blocking(move || tool.invoke(args)).await {
                    Ok(result) => Self::from_invocation(tool_id, result),
                    Err(e) => ToolInvocationResult::failed(tool_id, e.to_string()),
                }
            }
        }
    }

    /// Executes a tool by id from a synchronous caller.
    ///
    /// Blocking handles are invoked directly on the calling thread;
    /// suspending handles are driven to completion on the bridge.
    pub fn dispatch_blocking(&self, tool_id: &str, args: JsonValue) -> ToolInvocationResult {
        let Some(spec) = self.registry.get(tool_id) else {
            return ToolInvocationResult::not_found(tool_id);
        };

        match &spec.handle {
            ToolHandle::Blocking(tool) => Self::from_invocation(tool_id, tool.invoke(args)),
            ToolHandle::Suspending(tool) => {
                let tool = Arc::clone(tool);
                match self.bridge.run(async move { tool.invoke(args).await }) {
                    Ok(result) => Self::from_invocation(tool_id, result),
                    Err(e) => ToolInvocationResult::failed(tool_id, e.to_string()),
                }
            }
        }
    }

    fn from_invocation(
        tool_id: &str,
        result: Result<JsonValue, ToolError>,
    ) -> ToolInvocationResult {
        match result {
            Ok(value) => ToolInvocationResult::ok(tool_id, value),
            Err(e) => ToolInvocationResult::failed(tool_id, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{BlockingTool, SuspendingTool, ToolRow};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AddOneTool;

    impl BlockingTool for AddOneTool {
        fn invoke(&self, args: JsonValue) -> Result<JsonValue, ToolError> {
            let n = args.as_i64().unwrap_or(0);
            Ok(json!(n + 1))
        }
    }

    struct SleepyWeatherTool;

    #[async_trait]
    impl SuspendingTool for SleepyWeatherTool {
        async fn invoke(&self, _args: JsonValue) -> Result<JsonValue, ToolError> {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok(json!({ "condition": "sunny" }))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl SuspendingTool for FailingTool {
        async fn invoke(&self, _args: JsonValue) -> Result<JsonValue, ToolError> {
            Err(ToolError::execution("endpoint unreachable"))
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let (registry, _) = ToolRegistry::from_rows(vec![
            ToolRow::suspending(
                "weather",
                "Fetches the weather",
                &["天气", "weather"],
                Arc::new(SleepyWeatherTool),
            ),
            ToolRow::blocking("add_one", "Adds one", &["add"], Arc::new(AddOneTool)),
            ToolRow::suspending("broken", "Always fails", &["broken"], Arc::new(FailingTool)),
        ]);
        ToolDispatcher::new(Arc::new(registry)).expect("dispatcher")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatch_unknown_id_is_not_found() {
        let dispatcher = dispatcher();
        let result = dispatcher.dispatch("doesnotexist", JsonValue::Null).await;
        assert_eq!(result.outcome, ToolOutcome::NotFound);
        assert_eq!(result.tool_id, "doesnotexist");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatch_runs_suspending_tool() {
        let dispatcher = dispatcher();
        let result = dispatcher.dispatch("weather", JsonValue::Null).await;
        assert_eq!(
            result.outcome,
            ToolOutcome::Ok {
                value: json!({ "condition": "sunny" })
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatch_runs_blocking_tool() {
        let dispatcher = dispatcher();
        let result = dispatcher.dispatch("add_one", json!(41)).await;
        assert_eq!(result.outcome, ToolOutcome::Ok { value: json!(42) });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatch_surfaces_tool_failure() {
        let dispatcher = dispatcher();
        let result = dispatcher.dispatch("broken", JsonValue::Null).await;
        match result.outcome {
            ToolOutcome::Failed { reason } => assert!(reason.contains("endpoint unreachable")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn dispatch_blocking_from_plain_thread() {
        let dispatcher = dispatcher();

        let result = dispatcher.dispatch_blocking("weather", JsonValue::Null);
        assert!(result.is_ok());

        let result = dispatcher.dispatch_blocking("add_one", json!(1));
        assert_eq!(result.outcome, ToolOutcome::Ok { value: json!(2) });

        let result = dispatcher.dispatch_blocking("doesnotexist", JsonValue::Null);
        assert_eq!(result.outcome, ToolOutcome::NotFound);
    }

    #[test]
    fn dispatch_blocking_from_many_threads() {
        let dispatcher = Arc::new(dispatcher());
        let successes = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                let successes = Arc::clone(&successes);
                std::thread::spawn(move || {
                    for _ in 0..4 {
                        if dispatcher
                            .dispatch_blocking("weather", JsonValue::Null)
                            .is_ok()
                        {
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn bridge_runs_suspending_work_to_completion() {
        let bridge = SuspendBridge::new().expect("bridge");
        let value = bridge
            .run(async {
                tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                7
            })
            .expect("result");
        assert_eq!(value, 7);
    }

    #[test]
    fn invocation_result_serializes_with_status_tag() {
        let result = ToolInvocationResult::ok("weather", json!({ "temp": 22 }));
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["tool_id"], "weather");
        assert_eq!(json["outcome"]["status"], "ok");
        assert_eq!(json["outcome"]["value"]["temp"], 22);

        let json =
            serde_json::to_value(ToolInvocationResult::not_found("nope")).expect("serialize");
        assert_eq!(json["outcome"]["status"], "not_found");
    }
}
