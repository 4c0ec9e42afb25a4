//! The `tools/*` primitive family (§3 Primitives, §4.7).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::content::ContentBlock;
use crate::core::Cursor;
use crate::tasks::TaskMetadata;

/// Client-facing hints about a tool's behavior. Per the protocol these are
/// weak hints from a possibly-untrusted server and must never gate a
/// security decision.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolAnnotations {
    /// Display title, overriding `Tool::title` and `Tool::name` for UI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// If true, calling the tool may destructively modify state.
    #[serde(rename = "destructiveHint", skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    /// If true, repeated identical calls have no additional effect.
    #[serde(rename = "idempotentHint", skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    /// If true, the tool interacts with an open world of external entities.
    #[serde(rename = "openWorldHint", skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
    /// If true, the tool never modifies its environment.
    #[serde(rename = "readOnlyHint", skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
}

/// A JSON Schema object constraining a tool's `arguments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Always `"object"`.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property schemas, keyed by argument name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, serde_json::Value>>,
    /// Names of required arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Whether arguments outside `properties` are tolerated.
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<bool>,
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: None,
            required: None,
            additional_properties: None,
        }
    }
}

impl ToolInputSchema {
    /// A schema that accepts no arguments.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a property, creating the `properties` map on first use.
    #[must_use]
    pub fn add_property(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.properties
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), schema);
        self
    }

    /// Mark a property as required, creating the `required` list on first use.
    #[must_use]
    pub fn require(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let required = self.required.get_or_insert_with(Vec::new);
        if !required.contains(&name) {
            required.push(name);
        }
        self
    }
}

/// A JSON Schema object describing a tool's `structuredContent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutputSchema {
    /// Always `"object"`.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property schemas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, serde_json::Value>>,
    /// Names of properties guaranteed present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

/// A tool a server offers for a client to invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Programmatic identifier, unique within a server.
    pub name: String,
    /// Display title, falling back to `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// What the tool does, to help a model decide when to call it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Constrains `arguments` on `tools/call`.
    #[serde(rename = "inputSchema")]
    pub input_schema: ToolInputSchema,
    /// Constrains `structuredContent` on the result, if the tool returns one.
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<ToolOutputSchema>,
    /// Weak behavioral hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

impl Tool {
    /// Build a tool with an empty input schema.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or all whitespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.trim().is_empty(), "tool name cannot be empty");
        Self {
            name,
            title: None,
            description: None,
            input_schema: ToolInputSchema::empty(),
            output_schema: None,
            annotations: None,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: ToolInputSchema) -> Self {
        self.input_schema = schema;
        self
    }

    /// Attach an output schema.
    #[must_use]
    pub fn with_output_schema(mut self, schema: ToolOutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Attach behavioral annotations.
    #[must_use]
    pub fn with_annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }
}

/// `tools/list` request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListToolsRequest {
    /// Pagination cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// `tools/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// The page of tools.
    pub tools: Vec<Tool>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolRequest {
    /// Which tool to invoke.
    pub name: String,
    /// Arguments matching the tool's input schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, serde_json::Value>>,
    /// Requests task-augmented execution (§9).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskMetadata>,
}

/// `tools/call` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Human/model-readable content describing the outcome.
    pub content: Vec<ContentBlock>,
    /// `true` if the tool itself reported failure (as opposed to a
    /// transport- or protocol-level error).
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Structured result matching `Tool::output_schema`, if declared.
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
}

impl CallToolResult {
    /// A successful result carrying a single text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text(crate::content::TextContent::new(text))],
            is_error: None,
            structured_content: None,
        }
    }

    /// A failed result carrying a single text block describing the error.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text(crate::content::TextContent::new(
                message,
            ))],
            is_error: Some(true),
            structured_content: None,
        }
    }
}

/// `notifications/tools/list_changed` (no parameters).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolListChangedNotification;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_schema_builder_dedupes_required() {
        let schema = ToolInputSchema::empty()
            .add_property("x", serde_json::json!({"type": "number"}))
            .require("x")
            .require("x");
        assert_eq!(schema.required, Some(vec!["x".to_string()]));
    }

    #[test]
    fn call_tool_result_error_sets_is_error() {
        let result = CallToolResult::error("boom");
        assert_eq!(result.is_error, Some(true));
    }

    #[test]
    #[should_panic(expected = "tool name cannot be empty")]
    fn tool_rejects_blank_name() {
        Tool::new("   ");
    }
}
