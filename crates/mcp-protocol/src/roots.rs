//! Filesystem root discovery: a client tells the server which directories
//! it may operate within (§3 Primitives).

use serde::{Deserialize, Serialize};

use crate::core::Uri;

/// A single filesystem boundary the client exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Root {
    /// Typically a `file://` URI.
    pub uri: Uri,
    /// Human-readable name for display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `roots/list` request (no parameters; roots are not paginated).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListRootsRequest;

/// `roots/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRootsResult {
    /// The client's current roots.
    pub roots: Vec<Root>,
}

/// `notifications/roots/list_changed` (no parameters).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RootsListChangedNotification;
