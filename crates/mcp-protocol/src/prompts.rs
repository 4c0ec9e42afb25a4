//! The `prompts/*` primitive family (§3 Primitives, §4.7).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::content::ContentBlock;
use crate::core::{Cursor, Role};

/// A named, reusable prompt template a server offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// Programmatic identifier.
    pub name: String,
    /// Display title, falling back to `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// What the prompt is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The template's expected arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// A single templated argument of a [`Prompt`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// What the argument controls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the caller must supply it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// Caller-supplied values for a prompt's arguments.
pub type PromptInput = HashMap<String, serde_json::Value>;

/// `prompts/list` request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListPromptsRequest {
    /// Pagination cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// `prompts/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    /// The page of prompts.
    pub prompts: Vec<Prompt>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// `prompts/get` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptRequest {
    /// Which prompt to render.
    pub name: String,
    /// Values for the prompt's declared arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<PromptInput>,
}

/// `prompts/get` result: a fully rendered conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    /// What the prompt is for, echoed back for display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The rendered messages.
    pub messages: Vec<PromptMessage>,
}

/// One message in a rendered prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Who "said" this message.
    pub role: Role,
    /// The message body.
    pub content: ContentBlock,
}

/// `notifications/prompts/list_changed` (no parameters).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptListChangedNotification;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::TextContent;

    #[test]
    fn get_prompt_result_carries_rendered_messages() {
        let result = GetPromptResult {
            description: Some("greets the user".to_string()),
            messages: vec![PromptMessage {
                role: Role::User,
                content: ContentBlock::Text(TextContent::new("hi")),
            }],
        };
        assert_eq!(result.messages.len(), 1);
    }
}
