//! Server-initiated user input requests: `elicitation/create` (§3
//! Primitives, §7 Cancellation & URL elicitation interplay).
//!
//! Form mode collects structured data in-band, through the connected peer.
//! URL mode (§7) instead redirects the user to an out-of-band page, so
//! sensitive values never transit the MCP session; it is signalled by the
//! distinguished `-32042` error rather than a normal result (§4.1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The user's disposition toward an elicitation request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ElicitationAction {
    /// The user submitted the form.
    Accept,
    /// The user explicitly declined.
    Decline,
    /// The user dismissed the prompt without deciding.
    Cancel,
}

/// A single field's schema within an [`ElicitationSchema`]. Restricted to
/// flat primitive types; nested objects are out of scope (§6 Non-goals).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PrimitiveSchemaDefinition {
    /// A string field, optionally constrained to an enumeration.
    #[serde(rename = "string")]
    String {
        /// Display title.
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Field description.
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Minimum length.
        #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
        min_length: Option<u32>,
        /// Maximum length.
        #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
        max_length: Option<u32>,
        /// Allowed values, if this is effectively an enum.
        #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
        enum_values: Option<Vec<String>>,
    },
    /// A numeric field.
    #[serde(rename = "number")]
    Number {
        /// Display title.
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Field description.
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Inclusive lower bound.
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        /// Inclusive upper bound.
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    /// A boolean field.
    #[serde(rename = "boolean")]
    Boolean {
        /// Display title.
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Field description.
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Value used if the field is left blank.
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<bool>,
    },
}

/// A flat JSON Schema object constraining the form an elicitation collects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitationSchema {
    /// Always `"object"`.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Field schemas, keyed by field name.
    pub properties: HashMap<String, PrimitiveSchemaDefinition>,
    /// Required field names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ElicitationSchema {
    /// An empty schema with no properties.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: Some(Vec::new()),
        }
    }

    /// Add a string field.
    #[must_use]
    pub fn with_string(
        mut self,
        name: impl Into<String>,
        required: bool,
        description: Option<String>,
    ) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            PrimitiveSchemaDefinition::String {
                title: None,
                description,
                min_length: None,
                max_length: None,
                enum_values: None,
            },
        );
        if required {
            self.required.get_or_insert_with(Vec::new).push(name);
        }
        self
    }
}

impl Default for ElicitationSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// `elicitation/create` request: ask the user to fill in a small form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitRequest {
    /// What to ask for and why.
    pub message: String,
    /// Constrains the shape of the collected data.
    #[serde(rename = "requestedSchema")]
    pub requested_schema: ElicitationSchema,
}

/// `elicitation/create` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitResult {
    /// What the user did with the form.
    pub action: ElicitationAction,
    /// The collected values, present only when `action` is
    /// [`ElicitationAction::Accept`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<HashMap<String, serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_builder_tracks_required_fields() {
        let schema = ElicitationSchema::new().with_string("email", true, None);
        assert_eq!(schema.required, Some(vec!["email".to_string()]));
        assert!(schema.properties.contains_key("email"));
    }

    #[test]
    fn decline_result_has_no_content() {
        let result = ElicitResult {
            action: ElicitationAction::Decline,
            content: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("content").is_none());
    }
}
