//! Tool selection from a user message.
//!
//! The policy sits behind a trait so the phrase matcher can be replaced by
//! an intent classifier without touching the dispatcher contract.

use crate::tool::ToolRegistry;

/// Decides which tool, if any, a user message should trigger.
pub trait TriggerPolicy: Send + Sync {
    /// Returns the id of the tool the message triggers, or `None`.
    fn select(&self, registry: &ToolRegistry, message: &str) -> Option<String>;
}

/// Case-insensitive substring matching against each tool's fixed trigger
/// phrases, in registration order; the first match wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhraseTriggerPolicy;

impl TriggerPolicy for PhraseTriggerPolicy {
    fn select(&self, registry: &ToolRegistry, message: &str) -> Option<String> {
        let haystack = message.to_lowercase();
        registry
            .iter()
            .find(|spec| {
                spec.triggers
                    .iter()
                    .any(|phrase| !phrase.is_empty() && haystack.contains(&phrase.to_lowercase()))
            })
            .map(|spec| spec.id.clone())
    }
}
