//! Server-initiated LLM sampling: `sampling/createMessage` (§3 Primitives).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::content::ContentBlock;
use crate::core::Role;
use crate::tasks::TaskMetadata;

/// How much context from other servers to include in a sampling request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IncludeContext {
    /// No additional context.
    None,
    /// Context from the requesting server only.
    ThisServer,
    /// Context from every connected server.
    AllServers,
}

/// A single turn in the conversation to sample from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingMessage {
    /// Who said it.
    pub role: Role,
    /// What was said.
    pub content: ContentBlock,
}

/// A substring hint toward a preferred model, evaluated in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelHint {
    /// Substring to match against candidate model names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Weighted preferences steering model selection, left to the client to
/// interpret.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelPreferences {
    /// Ordered name hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<ModelHint>>,
    /// 0.0 (ignore cost) to 1.0 (minimize cost).
    #[serde(rename = "costPriority", skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,
    /// 0.0 (ignore latency) to 1.0 (minimize latency).
    #[serde(rename = "speedPriority", skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,
    /// 0.0 (ignore capability) to 1.0 (maximize capability).
    #[serde(
        rename = "intelligencePriority",
        skip_serializing_if = "Option::is_none"
    )]
    pub intelligence_priority: Option<f64>,
}

/// `sampling/createMessage` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    /// The conversation to continue.
    pub messages: Vec<SamplingMessage>,
    /// Optional steering toward a preferred model.
    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    /// Optional system prompt to prepend.
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// How much cross-server context to fold in.
    #[serde(rename = "includeContext", skip_serializing_if = "Option::is_none")]
    pub include_context: Option<IncludeContext>,
    /// Sampling temperature, `0.0` to `2.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Hard cap on generated tokens.
    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,
    /// Sequences that end generation early.
    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Requests task-augmented execution (§9).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskMetadata>,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// The model completed its turn naturally.
    EndTurn,
    /// `max_tokens` was reached.
    MaxTokens,
    /// A stop sequence matched.
    StopSequence,
    /// Content was filtered.
    ContentFilter,
}

/// `sampling/createMessage` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageResult {
    /// Always [`Role::Assistant`] in current usage.
    pub role: Role,
    /// The generated content.
    pub content: ContentBlock,
    /// Which model actually generated it.
    pub model: String,
    /// Why generation stopped, if known.
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

/// Token accounting for a sampling call, carried in `_meta` by convention.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageStats {
    /// Tokens consumed by the prompt.
    #[serde(rename = "inputTokens", skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    /// Tokens produced by the model.
    #[serde(rename = "outputTokens", skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
}

/// Arbitrary per-message metadata, kept distinct from the sampling types'
/// own fields so extensions don't collide with the wire schema.
pub type SamplingMetadata = HashMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_context_uses_camel_case() {
        assert_eq!(
            serde_json::to_string(&IncludeContext::ThisServer).unwrap(),
            "\"thisServer\""
        );
    }
}
