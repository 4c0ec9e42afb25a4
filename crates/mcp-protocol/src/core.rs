//! Shared vocabulary used across the primitive types: identity, timestamps,
//! roles, and annotation hints.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocol version string, e.g. `"2025-06-18"`.
pub type ProtocolVersion = String;

/// A resource or content URI. Kept as a plain string rather than a validated
/// newtype: the wire format never constrains the scheme, and primitive
/// authors are expected to validate against their own registered schemes.
pub type Uri = String;

/// A MIME type string, e.g. `"text/plain"`.
pub type MimeType = String;

/// Base64-encoded binary payload.
pub type Base64String = String;

/// Opaque pagination cursor, echoed back verbatim by the caller.
pub type Cursor = String;

/// RFC 3339 / ISO 8601 UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// The current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// The wrapped instant.
    #[must_use]
    pub const fn datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

/// Name/version/description of a client or server implementation, exchanged
/// during `initialize` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name.
    pub name: String,
    /// Display title, if different from `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Implementation version.
    pub version: String,
    /// Free-form description of what this implementation does.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for Implementation {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            title: None,
            version: "0.0.0".to_string(),
            description: None,
        }
    }
}

/// A message's role in a sampling or prompt conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant.
    Assistant,
}

/// Weak presentation hints attached to content blocks, resources, and
/// prompts. Never used for security decisions (§3 Non-goals).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Annotations {
    /// Intended audience roles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
    /// Subjective importance, no standard range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    /// ISO 8601 timestamp of last modification.
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// Application-specific extensions, preserved but not interpreted.
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

/// The `_meta`-only empty result used for `ping`, `setLevel`, and similar
/// acknowledgement-only methods.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EmptyResult {
    /// Optional metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips_through_rfc3339() {
        let ts = Timestamp::now();
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts.datetime().timestamp(), back.datetime().timestamp());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
