//! Handlers a client registers to answer server-initiated requests (§4.10):
//! sampling, elicitation, and roots. Registering one is also how
//! [`crate::capabilities::negotiate`] decides which `ClientCapabilities`
//! sub-fields to advertise during `initialize` — an unregistered capability
//! is never declared, so a server cannot invoke a method with nothing to
//! answer it.

use async_trait::async_trait;
use mcp_protocol::elicitation::{ElicitRequest, ElicitResult};
use mcp_protocol::roots::ListRootsResult;
use mcp_protocol::sampling::{CreateMessageRequest, CreateMessageResult};

use crate::error::ClientResult;

/// Answers `sampling/createMessage`: the server asks this client to run an
/// LLM completion on its behalf.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    /// Produce a sampling result for `request`.
    async fn create_message(&self, request: CreateMessageRequest) -> ClientResult<CreateMessageResult>;
}

/// Answers `elicitation/create`: the server asks this client to collect a
/// small form of user input (§4.10, §7).
#[async_trait]
pub trait ElicitationHandler: Send + Sync {
    /// Present `request` to the user and report what they did.
    async fn elicit(&self, request: ElicitRequest) -> ClientResult<ElicitResult>;
}

/// Answers `roots/list`: the server asks which filesystem roots this
/// client exposes.
#[async_trait]
pub trait RootsProvider: Send + Sync {
    /// The client's current roots.
    async fn list_roots(&self) -> ClientResult<ListRootsResult>;
}

/// The handlers a client has registered, consulted both to answer
/// server-initiated requests and to compute the capabilities declared at
/// `initialize`.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    pub(crate) sampling: Option<std::sync::Arc<dyn SamplingHandler>>,
    pub(crate) elicitation: Option<std::sync::Arc<dyn ElicitationHandler>>,
    pub(crate) roots: Option<std::sync::Arc<dyn RootsProvider>>,
}

impl HandlerRegistry {
    /// An empty registry: no server-initiated request can be answered, and
    /// `initialize` will declare none of the corresponding capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the sampling handler.
    #[must_use]
    pub fn with_sampling(mut self, handler: std::sync::Arc<dyn SamplingHandler>) -> Self {
        self.sampling = Some(handler);
        self
    }

    /// Register (or replace) the elicitation handler.
    #[must_use]
    pub fn with_elicitation(mut self, handler: std::sync::Arc<dyn ElicitationHandler>) -> Self {
        self.elicitation = Some(handler);
        self
    }

    /// Register (or replace) the roots provider.
    #[must_use]
    pub fn with_roots(mut self, provider: std::sync::Arc<dyn RootsProvider>) -> Self {
        self.roots = Some(provider);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysDeclines;

    #[async_trait]
    impl ElicitationHandler for AlwaysDeclines {
        async fn elicit(&self, _request: ElicitRequest) -> ClientResult<ElicitResult> {
            Ok(ElicitResult {
                action: mcp_protocol::elicitation::ElicitationAction::Decline,
                content: None,
            })
        }
    }

    #[test]
    fn empty_registry_has_no_handlers() {
        let registry = HandlerRegistry::new();
        assert!(registry.elicitation.is_none());
    }

    #[tokio::test]
    async fn registered_handler_is_reachable_through_the_trait_object() {
        let registry = HandlerRegistry::new().with_elicitation(std::sync::Arc::new(AlwaysDeclines));
        let handler = registry.elicitation.expect("registered");
        let result = handler
            .elicit(ElicitRequest {
                message: "confirm?".to_string(),
                requested_schema: mcp_protocol::elicitation::ElicitationSchema::new(),
            })
            .await
            .unwrap();
        assert_eq!(result.action, mcp_protocol::elicitation::ElicitationAction::Decline);
    }
}
