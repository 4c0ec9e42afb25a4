//! Content blocks: the rich payload carried by prompt messages, tool
//! results, and sampling messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{Annotations, Base64String, MimeType, Uri};

/// A single piece of content. Tagged on `type` so heterogeneous content
/// blocks can be mixed freely in a `Vec<ContentBlock>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text.
    #[serde(rename = "text")]
    Text(TextContent),
    /// A base64-encoded image.
    #[serde(rename = "image")]
    Image(ImageContent),
    /// A base64-encoded audio clip.
    #[serde(rename = "audio")]
    Audio(AudioContent),
    /// A link to a resource, without inlining its contents.
    #[serde(rename = "resource_link")]
    ResourceLink(ResourceLink),
    /// A resource's contents inlined directly into the message.
    #[serde(rename = "resource")]
    Resource(EmbeddedResource),
}

/// Text content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// The text itself.
    pub text: String,
    /// Presentation hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// Extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

impl TextContent {
    /// Build a bare text block with no annotations or metadata.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotations: None,
            meta: None,
        }
    }
}

/// Image content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    /// Base64-encoded image bytes.
    pub data: Base64String,
    /// The image's MIME type.
    #[serde(rename = "mimeType")]
    pub mime_type: MimeType,
    /// Presentation hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// Extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

/// Audio content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioContent {
    /// Base64-encoded audio bytes.
    pub data: Base64String,
    /// The audio's MIME type.
    #[serde(rename = "mimeType")]
    pub mime_type: MimeType,
    /// Presentation hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// Extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

/// A pointer to a resource, carried inline without fetching its contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLink {
    /// Resource name.
    pub name: String,
    /// Display title.
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

/// A resource's contents, embedded directly in a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedResource {
    /// The embedded contents.
    pub resource: ResourceContent,
    /// Presentation hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// Extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

/// A resource body read as UTF-8 text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextResourceContents {
    /// The resource's URI.
    pub uri: Uri,
    /// The resource's MIME type, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
    /// The text.
    pub text: String,
}

/// A resource body that is not representable as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobResourceContents {
    /// The resource's URI.
    pub uri: Uri,
    /// The resource's MIME type, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
    /// Base64-encoded bytes.
    pub blob: Base64String,
}

/// Either a text or binary resource body, disambiguated by which of `text`
/// / `blob` is present on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContent {
    /// Text body.
    Text(TextResourceContents),
    /// Binary body.
    Blob(BlobResourceContents),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_block_tags_on_type() {
        let block = ContentBlock::Text(TextContent::new("hello"));
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"], "hello");
    }

    #[test]
    fn resource_content_discriminates_by_shape() {
        let text = serde_json::json!({"uri": "file:///a", "text": "hi"});
        let blob = serde_json::json!({"uri": "file:///b", "blob": "aGk="});
        assert!(matches!(
            serde_json::from_value::<ResourceContent>(text).unwrap(),
            ResourceContent::Text(_)
        ));
        assert!(matches!(
            serde_json::from_value::<ResourceContent>(blob).unwrap(),
            ResourceContent::Blob(_)
        ));
    }
}
