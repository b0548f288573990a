//! Conversation orchestration.
//!
//! [`ConversationOrchestrator`] answers one turn: resolve the session,
//! load recent context, pick a tool, dispatch it, generate a response, and
//! record the turn. It owns no state of its own; every collaborator is an
//! explicit constructor dependency, so test doubles slot in and multiple
//! independent instances can coexist.
//!
//! The orchestrator is invoked concurrently for many identities with no
//! global serialization. Two simultaneous turns for the same identity may
//! both observe the same pre-turn context; that is an accepted limitation
//! of the design, resolved only at the session store's uniqueness
//! constraint, not papered over with locks.

use crate::dispatch::{ToolDispatcher, ToolOutcome};
use crate::error::TurnError;
use crate::history::{HistoryEntry, HistoryStore};
use crate::select::TriggerPolicy;
use crate::session::{Identity, SessionDirectory};
use chrono::{DateTime, Utc};
use colloquy_ai::{ChatMessage, GenerationBackend};
use colloquy_core::ChatSessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// The used-tool marker for turns answered without consulting a tool.
pub const NO_TOOL: &str = "normal";

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// System priming prepended to every prompt.
    #[serde(default = "default_system_priming")]
    pub system_priming: String,
    /// How many recent turns feed the generation prompt.
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,
    /// How many recent turns a read-only history query returns.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

fn default_system_priming() -> String {
    "You are a helpful assistant that remembers the conversation so far \
     and can consult tools on the user's behalf."
        .to_string()
}

fn default_context_turns() -> usize {
    5
}

fn default_history_turns() -> usize {
    20
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            system_priming: default_system_priming(),
            context_turns: default_context_turns(),
            history_turns: default_history_turns(),
        }
    }
}

/// Whether the answered turn made it into the durable record.
///
/// "Answered but not recorded" is a distinct outcome from failing to
/// answer at all; callers need to tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    /// The turn was written to the durable log.
    Recorded,
    /// The assistant answered but the durable write failed.
    Unrecorded { reason: String },
}

/// The result of one handled turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    /// The session the turn belongs to.
    pub session_id: ChatSessionId,
    /// The consulted tool id, or [`NO_TOOL`].
    pub used_tool: String,
    /// The assistant's response.
    pub response: String,
    /// When the turn completed (UTC).
    pub timestamp: DateTime<Utc>,
    /// Whether the turn was recorded.
    pub record: RecordStatus,
}

/// A read-only view of a session's recent history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryView {
    /// The session the history belongs to.
    pub session_id: ChatSessionId,
    /// Recent turns in chronological order.
    pub history: Vec<HistoryEntry>,
}

/// Composes session continuity, history, tool dispatch, and generation to
/// answer turns.
pub struct ConversationOrchestrator {
    directory: Arc<SessionDirectory>,
    history: Arc<HistoryStore>,
    dispatcher: Arc<ToolDispatcher>,
    policy: Arc<dyn TriggerPolicy>,
    backend: Arc<dyn GenerationBackend>,
    settings: OrchestratorSettings,
}

impl ConversationOrchestrator {
    /// Creates an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        directory: Arc<SessionDirectory>,
        history: Arc<HistoryStore>,
        dispatcher: Arc<ToolDispatcher>,
        policy: Arc<dyn TriggerPolicy>,
        backend: Arc<dyn GenerationBackend>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            directory,
            history,
            dispatcher,
            policy,
            backend,
            settings,
        }
    }

    /// Answers one turn for an identity.
    ///
    /// # Errors
    ///
    /// Every failure mode is returned as a structured [`TurnError`];
    /// nothing propagates past this boundary. A failed durable append does
    /// NOT fail the turn; the reply carries [`RecordStatus::Unrecorded`]
    /// instead.
    pub async fn handle_turn(
        &self,
        identity: &Identity,
        message: &str,
    ) -> Result<TurnReply, TurnError> {
        let session = self
            .directory
            .get_or_create(identity)
            .await
            .map_err(|e| TurnError::Session {
                reason: e.to_string(),
            })?;

        let context = self
            .history
            .load_context(session.id, self.settings.context_turns)
            .await;

        let selected = self.policy.select(self.dispatcher.registry(), message);
        let annotation = match &selected {
            None => None,
            Some(tool_id) => {
                let result = self.dispatcher.dispatch(tool_id, JsonValue::Null).await;
                match result.outcome {
                    ToolOutcome::Ok { value } => Some(format!(
                        "You consulted the {tool_id} tool and it returned:\n{value}\n\
                         Answer the user's question based on this information."
                    )),
                    ToolOutcome::NotFound => {
                        return Err(TurnError::ToolNotFound {
                            tool_id: tool_id.clone(),
                        });
                    }
                    ToolOutcome::Failed { reason } => {
                        return Err(TurnError::Tool {
                            tool_id: tool_id.clone(),
                            reason,
                        });
                    }
                }
            }
        };

        let prompt = self.build_prompt(&context, message, annotation.as_deref());
        let response =
            self.backend
                .generate(&prompt)
                .await
                .map_err(|e| TurnError::Generation {
                    reason: e.to_string(),
                })?;

        let record = match self
            .history
            .append_turn(session.id, message, response.as_str(), selected.clone())
            .await
        {
            Ok(_) => RecordStatus::Recorded,
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "turn answered but not recorded"
                );
                RecordStatus::Unrecorded {
                    reason: e.to_string(),
                }
            }
        };

        Ok(TurnReply {
            session_id: session.id,
            used_tool: selected.unwrap_or_else(|| NO_TOOL.to_string()),
            response,
            timestamp: Utc::now(),
            record,
        })
    }

    /// Returns the identity's recent history.
    ///
    /// Resolves the session idempotently (a fresh identity gets an empty
    /// history under a newly created session) and reads with the larger
    /// inspection limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be resolved. Read failures
    /// inside the history store degrade to an empty sequence.
    pub async fn get_history(&self, identity: &Identity) -> Result<HistoryView, TurnError> {
        let session = self
            .directory
            .get_or_create(identity)
            .await
            .map_err(|e| TurnError::Session {
                reason: e.to_string(),
            })?;

        let history = self
            .history
            .load_context(session.id, self.settings.history_turns)
            .await;

        Ok(HistoryView {
            session_id: session.id,
            history,
        })
    }

    /// Clears the identity's chat history.
    ///
    /// Returns true if any history existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be resolved or the durable
    /// delete fails.
    pub async fn clear_history(&self, identity: &Identity) -> Result<bool, TurnError> {
        let session = self
            .directory
            .get_or_create(identity)
            .await
            .map_err(|e| TurnError::Session {
                reason: e.to_string(),
            })?;

        self.history
            .clear(session.id)
            .await
            .map_err(|e| TurnError::Store {
                reason: e.to_string(),
            })
    }

    /// Assembles the generation prompt: priming, recent turns as
    /// alternating user/assistant messages, the current message, and the
    /// tool annotation when a tool ran.
    fn build_prompt(
        &self,
        context: &[HistoryEntry],
        message: &str,
        annotation: Option<&str>,
    ) -> Vec<ChatMessage> {
        let mut prompt = Vec::with_capacity(context.len() * 2 + 3);
        prompt.push(ChatMessage::system(self.settings.system_priming.as_str()));
        for entry in context {
            prompt.push(ChatMessage::user(entry.user_message.as_str()));
            prompt.push(ChatMessage::assistant(entry.assistant_response.as_str()));
        }
        prompt.push(ChatMessage::user(message));
        if let Some(annotation) = annotation {
            prompt.push(ChatMessage::system(annotation));
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, ToolError};
    use crate::select::PhraseTriggerPolicy;
    use crate::session::{SessionRecord, SessionStore};
    use crate::tool::{SuspendingTool, ToolRegistry, ToolRow};
    use async_trait::async_trait;
    use colloquy_ai::GenerationError;
    use colloquy_core::IdentityId;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct InMemorySessionStore {
        rows: Mutex<HashMap<IdentityId, SessionRecord>>,
    }

    #[async_trait]
    impl SessionStore for InMemorySessionStore {
        async fn find_by_identity(
            &self,
            identity: IdentityId,
        ) -> Result<Option<SessionRecord>, StoreError> {
            Ok(self.rows.lock().unwrap().get(&identity).cloned())
        }

        async fn insert_or_fetch(
            &self,
            record: SessionRecord,
        ) -> Result<SessionRecord, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows.entry(record.identity_id).or_insert(record).clone())
        }

        async fn touch(
            &self,
            identity: IdentityId,
            at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            if let Some(row) = self.rows.lock().unwrap().get_mut(&identity) {
                row.last_active_at = at;
            }
            Ok(())
        }

        async fn delete_by_identity(&self, identity: IdentityId) -> Result<bool, StoreError> {
            Ok(self.rows.lock().unwrap().remove(&identity).is_some())
        }
    }

    #[derive(Default)]
    struct InMemoryTurnStore {
        rows: Mutex<Vec<HistoryEntry>>,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl crate::history::TurnStore for InMemoryTurnStore {
        async fn append(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::write("simulated write failure"));
            }
            self.rows.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn recent(
            &self,
            session_id: ChatSessionId,
            limit: usize,
        ) -> Result<Vec<HistoryEntry>, StoreError> {
            let mut matching: Vec<_> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.session_id == session_id)
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            matching.truncate(limit);
            Ok(matching)
        }

        async fn delete_all(&self, session_id: ChatSessionId) -> Result<u64, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|e| e.session_id != session_id);
            Ok((before - rows.len()) as u64)
        }
    }

    /// Backend that answers with every prompt message joined together, so
    /// assertions can see exactly what the orchestrator sent.
    struct EchoBackend;

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
            Ok(messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n---\n"))
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl GenerationBackend for FailingBackend {
        async fn generate(&self, _messages: &[ChatMessage]) -> Result<String, GenerationError> {
            Err(GenerationError::RequestFailed {
                reason: "backend down".to_string(),
            })
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    /// Backend that records every prompt it receives and answers "ok".
    #[derive(Default)]
    struct RecordingBackend {
        prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl GenerationBackend for RecordingBackend {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            Ok("ok".to_string())
        }

        fn model(&self) -> &str {
            "recording"
        }
    }

    struct WeatherTool;

    #[async_trait]
    impl SuspendingTool for WeatherTool {
        async fn invoke(&self, _args: JsonValue) -> Result<JsonValue, ToolError> {
            Ok(json!({ "condition": "sunny", "temp_c": 22 }))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl SuspendingTool for BrokenTool {
        async fn invoke(&self, _args: JsonValue) -> Result<JsonValue, ToolError> {
            Err(ToolError::execution("endpoint unreachable"))
        }
    }

    struct Fixture {
        orchestrator: ConversationOrchestrator,
        turn_store: Arc<InMemoryTurnStore>,
    }

    fn fixture_with_backend(backend: Arc<dyn GenerationBackend>) -> Fixture {
        let session_store = Arc::new(InMemorySessionStore::default());
        let turn_store = Arc::new(InMemoryTurnStore::default());

        let (registry, _) = ToolRegistry::from_rows(vec![
            ToolRow::suspending(
                "weather",
                "Fetches the weather",
                &["天气", "weather"],
                Arc::new(WeatherTool),
            ),
            ToolRow::suspending("broken", "Always fails", &["broken"], Arc::new(BrokenTool)),
        ]);

        let orchestrator = ConversationOrchestrator::new(
            Arc::new(SessionDirectory::new(session_store)),
            Arc::new(HistoryStore::new(turn_store.clone())),
            Arc::new(ToolDispatcher::new(Arc::new(registry)).expect("dispatcher")),
            Arc::new(PhraseTriggerPolicy),
            backend,
            OrchestratorSettings::default(),
        );

        Fixture {
            orchestrator,
            turn_store,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_backend(Arc::new(EchoBackend))
    }

    fn identity(name: &str) -> Identity {
        Identity::new(IdentityId::new(), name)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tool_turn_then_plain_turn_scenario() {
        let fixture = fixture();
        let u1 = identity("u1");

        let first = fixture
            .orchestrator
            .handle_turn(&u1, "今天天气怎么样")
            .await
            .unwrap();
        assert_eq!(first.used_tool, "weather");
        assert!(first.response.contains("sunny"));
        assert_eq!(first.record, RecordStatus::Recorded);

        let second = fixture.orchestrator.handle_turn(&u1, "谢谢").await.unwrap();
        assert_eq!(second.used_tool, NO_TOOL);
        assert_eq!(second.session_id, first.session_id);

        let view = fixture.orchestrator.get_history(&u1).await.unwrap();
        assert_eq!(view.session_id, first.session_id);
        assert_eq!(view.history.len(), 2);
        assert_eq!(view.history[0].user_message, "今天天气怎么样");
        assert_eq!(view.history[0].tool_used.as_deref(), Some("weather"));
        assert_eq!(view.history[1].user_message, "谢谢");
        assert_eq!(view.history[1].tool_used, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn prompt_contains_priming_context_and_message() {
        let fixture = fixture();
        let u1 = identity("u1");

        fixture.orchestrator.handle_turn(&u1, "hello").await.unwrap();
        let reply = fixture
            .orchestrator
            .handle_turn(&u1, "do you remember me?")
            .await
            .unwrap();

        // Echoed prompt: priming, prior turn, current message.
        assert!(reply.response.contains("helpful assistant"));
        assert!(reply.response.contains("hello"));
        assert!(reply.response.contains("do you remember me?"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn context_is_bounded_to_configured_turns() {
        let backend = Arc::new(RecordingBackend::default());
        let fixture = fixture_with_backend(backend.clone());
        let u1 = identity("u1");

        for i in 0..8 {
            fixture
                .orchestrator
                .handle_turn(&u1, format!("message {i}").as_str())
                .await
                .unwrap();
        }

        fixture.orchestrator.handle_turn(&u1, "latest").await.unwrap();

        let prompts = backend.prompts.lock().unwrap();
        let last = prompts.last().unwrap();
        // Priming + 5 context turns (user/assistant pairs) + current message.
        assert_eq!(last.len(), 1 + 5 * 2 + 1);
        assert_eq!(last[1].content, "message 3");
        assert_eq!(last[last.len() - 1].content, "latest");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn generation_failure_records_nothing() {
        let fixture = fixture_with_backend(Arc::new(FailingBackend));
        let u1 = identity("u1");

        let result = fixture.orchestrator.handle_turn(&u1, "hello").await;

        assert!(matches!(result, Err(TurnError::Generation { .. })));
        assert!(fixture.turn_store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tool_failure_surfaces_with_tool_id() {
        let fixture = fixture();
        let u1 = identity("u1");

        let result = fixture
            .orchestrator
            .handle_turn(&u1, "run the broken thing")
            .await;

        match result {
            Err(TurnError::Tool { tool_id, reason }) => {
                assert_eq!(tool_id, "broken");
                assert!(reason.contains("endpoint unreachable"));
            }
            other => panic!("expected tool failure, got {other:?}"),
        }
        assert!(fixture.turn_store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn append_failure_yields_unrecorded_reply() {
        let fixture = fixture();
        let u1 = identity("u1");
        fixture.turn_store.fail_writes.store(true, Ordering::SeqCst);

        let reply = fixture.orchestrator.handle_turn(&u1, "hello").await.unwrap();

        assert!(matches!(reply.record, RecordStatus::Unrecorded { .. }));
        assert!(!reply.response.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn clear_history_then_empty_view() {
        let fixture = fixture();
        let u1 = identity("u1");

        fixture.orchestrator.handle_turn(&u1, "hello").await.unwrap();
        assert!(fixture.orchestrator.clear_history(&u1).await.unwrap());
        assert!(!fixture.orchestrator.clear_history(&u1).await.unwrap());

        let view = fixture.orchestrator.get_history(&u1).await.unwrap();
        assert!(view.history.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fresh_identity_gets_session_and_empty_history() {
        let fixture = fixture();
        let view = fixture
            .orchestrator
            .get_history(&identity("new"))
            .await
            .unwrap();
        assert!(view.history.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn identities_are_isolated() {
        let fixture = fixture();
        let u1 = identity("u1");
        let u2 = identity("u2");

        let r1 = fixture.orchestrator.handle_turn(&u1, "hello").await.unwrap();
        let r2 = fixture.orchestrator.handle_turn(&u2, "hi").await.unwrap();

        assert_ne!(r1.session_id, r2.session_id);
        let view = fixture.orchestrator.get_history(&u2).await.unwrap();
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.history[0].user_message, "hi");
    }

    #[test]
    fn settings_defaults() {
        let settings = OrchestratorSettings::default();
        assert_eq!(settings.context_turns, 5);
        assert_eq!(settings.history_turns, 20);
        assert!(!settings.system_priming.is_empty());
    }

    #[test]
    fn turn_reply_serializes_record_status() {
        let reply = TurnReply {
            session_id: ChatSessionId::new(),
            used_tool: NO_TOOL.to_string(),
            response: "hi".to_string(),
            timestamp: Utc::now(),
            record: RecordStatus::Unrecorded {
                reason: "disk full".to_string(),
            },
        };
        let json = serde_json::to_value(&reply).expect("serialize");
        assert_eq!(json["record"]["status"], "unrecorded");
        assert_eq!(json["record"]["reason"], "disk full");
    }
}
