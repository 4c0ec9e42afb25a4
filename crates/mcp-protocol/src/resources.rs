//! The `resources/*` primitive family (§3 Primitives, §4.7), including
//! subscriptions and RFC 6570-templated resources (§11).

use serde::{Deserialize, Serialize};

use crate::content::ResourceContent;
use crate::core::{Annotations, Cursor, MimeType, Uri};

/// A single addressable piece of context a server can supply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Programmatic identifier.
    pub name: String,
    /// Display title, falling back to `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The resource's URI.
    pub uri: Uri,
    /// What the resource represents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The resource's MIME type, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
    /// Presentation hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// Size in bytes, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A parameterized family of resources, addressed via an RFC 6570 level-1
/// URI template (e.g. `file:///logs/{date}.log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTemplate {
    /// Programmatic identifier.
    pub name: String,
    /// Display title, falling back to `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The level-1 URI template string.
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    /// What resources from this family represent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The MIME type of resources generated from this template, if uniform.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
    /// Presentation hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// `resources/list` request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListResourcesRequest {
    /// Pagination cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// `resources/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// The page of resources.
    pub resources: Vec<Resource>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// `resources/templates/list` request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListResourceTemplatesRequest {
    /// Pagination cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// `resources/templates/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourceTemplatesResult {
    /// The page of templates.
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<ResourceTemplate>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// `resources/read` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceRequest {
    /// Which resource to read. May match a template instance.
    pub uri: Uri,
}

/// `resources/read` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// The resource's contents. A template read may return more than one
    /// entry (e.g. a directory-like resource expanding to its children).
    pub contents: Vec<ResourceContent>,
}

/// `resources/subscribe` request: ask to receive `notifications/resources/updated`
/// when `uri`'s contents change (§11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// The resource to watch.
    pub uri: Uri,
}

/// `resources/unsubscribe` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    /// The resource to stop watching.
    pub uri: Uri,
}

/// `notifications/resources/updated`: a subscribed resource changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdatedNotification {
    /// The resource that changed.
    pub uri: Uri,
}

/// `notifications/resources/list_changed` (no parameters).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourceListChangedNotification;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_resources_result_omits_next_cursor_when_none() {
        let result = ListResourcesResult {
            resources: vec![],
            next_cursor: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("nextCursor").is_none());
    }
}
