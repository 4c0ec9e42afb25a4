//! Tracks which resource URIs this session's peer has subscribed to
//! (§4.8, §11), so [`crate::session::ServerSession::notify_resource_updated`]
//! only emits `notifications/resources/updated` for URIs the peer actually
//! asked about.

use std::sync::Arc;

use dashmap::DashSet;

/// Shared, concurrently-updated set of subscribed URIs.
#[derive(Clone, Default)]
pub struct Subscriptions {
    uris: Arc<DashSet<String>>,
}

impl Subscriptions {
    /// Build an empty subscription set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `resources/subscribe` for `uri`.
    pub fn subscribe(&self, uri: impl Into<String>) {
        self.uris.insert(uri.into());
    }

    /// Drop a `resources/unsubscribe` for `uri`.
    pub fn unsubscribe(&self, uri: &str) {
        self.uris.remove(uri);
    }

    /// Whether `uri` currently has a subscriber.
    #[must_use]
    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.uris.contains(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_then_unsubscribe_clears_interest() {
        let subscriptions = Subscriptions::new();
        subscriptions.subscribe("file:///log");
        assert!(subscriptions.is_subscribed("file:///log"));
        subscriptions.unsubscribe("file:///log");
        assert!(!subscriptions.is_subscribed("file:///log"));
    }

    #[test]
    fn unrelated_uri_is_not_subscribed() {
        let subscriptions = Subscriptions::new();
        subscriptions.subscribe("file:///a");
        assert!(!subscriptions.is_subscribed("file:///b"));
    }
}
