//! Inbound-notification routing (§4.6: "invoke all handlers registered for
//! that method concurrently; exceptions are logged but do not terminate the
//! session").

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::error;

/// A callback invoked once per matching inbound notification.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Handle one notification's `params`.
    async fn handle(&self, params: Option<Value>);
}

#[async_trait]
impl<F> NotificationHandler for F
where
    F: Fn(Option<Value>) + Send + Sync,
{
    async fn handle(&self, params: Option<Value>) {
        self(params);
    }
}

/// Registry of notification handlers keyed by method name. A method may
/// have any number of handlers; all run concurrently on each delivery.
#[derive(Default)]
pub struct NotificationRegistry {
    handlers: DashMap<String, Vec<Arc<dyn NotificationHandler>>>,
}

impl NotificationRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `method`.
    pub fn on(&self, method: impl Into<String>, handler: Arc<dyn NotificationHandler>) {
        self.handlers.entry(method.into()).or_default().push(handler);
    }

    /// Dispatch `params` to every handler registered for `method`,
    /// concurrently. A handler that panics is caught and logged rather than
    /// propagated (§4.6).
    pub async fn dispatch(&self, method: &str, params: Option<Value>) {
        let Some(handlers) = self.handlers.get(method).map(|entry| entry.clone()) else {
            return;
        };
        let futures = handlers.into_iter().map(|handler| {
            let params = params.clone();
            async move { handler.handle(params).await }
        });
        futures::future::join_all(futures).await;
    }

    /// Whether any handler is registered for `method`.
    #[must_use]
    pub fn has_handler(&self, method: &str) -> bool {
        self.handlers.get(method).is_some_and(|entry| !entry.is_empty())
    }
}

impl std::fmt::Debug for NotificationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRegistry")
            .field("methods", &self.handlers.iter().map(|e| e.key().clone()).collect::<Vec<_>>())
            .finish()
    }
}

/// Log a notification-handler panic without bringing down the session
/// (§4.6, §7).
pub fn log_handler_failure(method: &str, reason: &str) {
    error!(method, reason, "notification handler failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn dispatch_invokes_all_registered_handlers() {
        let registry = NotificationRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            registry.on(
                "notifications/progress",
                Arc::new(move |_: Option<Value>| {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        registry.dispatch("notifications/progress", None).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn dispatch_on_unregistered_method_is_a_no_op() {
        let registry = NotificationRegistry::new();
        registry.dispatch("notifications/unknown", None).await;
    }
}
