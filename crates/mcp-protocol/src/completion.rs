//! Argument autocompletion: `completion/complete` (§11 supplemented
//! features).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The argument currently being completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArgumentInfo {
    /// Argument name.
    pub name: String,
    /// Partial value typed so far.
    pub value: String,
}

/// What kind of thing is being completed against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CompletionReference {
    /// Completing an argument of a prompt template.
    #[serde(rename = "ref/prompt")]
    Prompt {
        /// The prompt's name.
        name: String,
    },
    /// Completing a variable of a resource template.
    #[serde(rename = "ref/resource")]
    ResourceTemplate {
        /// The template's URI pattern.
        uri: String,
    },
}

/// Previously-resolved argument values, for completions that depend on
/// earlier choices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompletionContext {
    /// Already-resolved argument values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

/// `completion/complete` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteRequest {
    /// What's being completed.
    #[serde(rename = "ref")]
    pub reference: CompletionReference,
    /// The argument and partial value.
    pub argument: ArgumentInfo,
    /// Context from already-resolved arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<CompletionContext>,
}

/// The suggestion payload of a [`CompleteRequest`] response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionValues {
    /// Suggested values, capped at 100 entries per call.
    pub values: Vec<String>,
    /// Total number of matches, which may exceed `values.len()`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    /// Whether more matches exist beyond `values`.
    #[serde(rename = "hasMore", skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

/// `completion/complete` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteResult {
    /// The suggestions.
    pub completion: CompletionValues,
}

impl CompleteResult {
    /// Build a result from a plain value list, with no total/has_more hint.
    #[must_use]
    pub fn from_values(values: Vec<String>) -> Self {
        Self {
            completion: CompletionValues {
                values,
                total: None,
                has_more: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_tags_by_kind() {
        let prompt = CompletionReference::Prompt {
            name: "greeting".to_string(),
        };
        let value = serde_json::to_value(&prompt).unwrap();
        assert_eq!(value["type"], "ref/prompt");
    }
}
