//! Argument autocompletion (§11): a server registers at most one
//! [`CompletionHandler`] to answer `completion/complete` for every prompt
//! argument and resource template variable it offers.

use async_trait::async_trait;
use mcp_protocol::completion::{CompleteRequest, CompleteResult};

use crate::error::ServerResult;

/// Answers `completion/complete`. Declaring one is what causes
/// [`crate::capabilities::negotiate_server_capabilities`] to advertise the
/// `completions` capability.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    /// Suggest values for the partially-typed argument in `request`.
    async fn complete(&self, request: CompleteRequest) -> ServerResult<CompleteResult>;
}

#[async_trait]
impl<F, Fut> CompletionHandler for F
where
    F: Fn(CompleteRequest) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ServerResult<CompleteResult>> + Send,
{
    async fn complete(&self, request: CompleteRequest) -> ServerResult<CompleteResult> {
        self(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_protocol::completion::{ArgumentInfo, CompletionReference};

    #[tokio::test]
    async fn closure_handler_is_callable_through_the_trait_object() {
        let handler: std::sync::Arc<dyn CompletionHandler> =
            std::sync::Arc::new(|_req: CompleteRequest| async { Ok(CompleteResult::from_values(vec!["a".to_string()])) });
        let result = handler
            .complete(CompleteRequest {
                reference: CompletionReference::Prompt { name: "greet".to_string() },
                argument: ArgumentInfo { name: "lang".to_string(), value: "e".to_string() },
                context: None,
            })
            .await
            .unwrap();
        assert_eq!(result.completion.values, vec!["a".to_string()]);
    }
}
