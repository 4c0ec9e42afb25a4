//! The handler filter pipeline (§4.7): `f1 ∘ f2 ∘ … ∘ fn ∘ base`, with
//! registration order determining outermost-first execution.
//!
//! A [`HandlerFilter`] wraps the next link in the chain; code written
//! before its call to `next.handle(ctx)` runs on the way in, code written
//! after runs on the way out — so `[f1, f2, f3]` registered in that order
//! yields `pre(f1); pre(f2); pre(f3); base; post(f3); post(f2); post(f1)`
//! (§8), matching a classic middleware "onion".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{SessionError, SessionResult};

/// Per-request context threaded through the whole filter chain.
pub struct FilterContext {
    /// The method being dispatched, e.g. `"tools/call"`.
    pub method: String,
    /// The request's raw `params`, before any filter has touched it.
    pub params: Option<Value>,
    /// The primitive (tool/prompt/resource) this call resolved to, if any
    /// filter or the base handler has matched one. Filters earlier in the
    /// chain run before matching occurs for invocation methods routed by
    /// name; they populate this for filters further in.
    pub matched_primitive: Option<PrimitiveMetadata>,
    /// The caller's identity, if the transport or an earlier filter
    /// established one (e.g. from a bearer token). `None` means anonymous.
    pub caller_identity: Option<String>,
    /// Freeform inter-filter scratch space — one filter writes a key here,
    /// a later one reads it. Not persisted past this single call.
    pub items: HashMap<String, Value>,
    /// Cancelled when the peer sends a matching `notifications/cancelled`
    /// (§4.6). A long-running handler should `select!` on this rather than
    /// run to completion regardless.
    pub cancel: CancellationToken,
}

impl FilterContext {
    /// Build a context for a fresh call with a standalone cancellation
    /// token (use [`Self::with_cancel`] to wire in the session's own).
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            matched_primitive: None,
            caller_identity: None,
            items: HashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Build a context carrying the session-issued cancellation token for
    /// this request.
    #[must_use]
    pub fn with_cancel(method: impl Into<String>, params: Option<Value>, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..Self::new(method, params)
        }
    }
}

/// The open metadata bag a primitive carries, consulted by filters (e.g.
/// authorization) without those filters needing to know the primitive's
/// concrete type (§3 Tool/Prompt/Resource primitives).
#[derive(Debug, Clone, Default)]
pub struct PrimitiveMetadata {
    /// The primitive's name (or URI template, for resource templates).
    pub name: String,
    /// Arbitrary key/value metadata attached at registration time.
    pub metadata: HashMap<String, Value>,
}

impl PrimitiveMetadata {
    /// Build metadata for a named primitive with no extra bag contents.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// The innermost link of the chain: the actual primitive invocation or
/// protocol method implementation.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Produce this method's `result` value, or an error to report back to
    /// the peer.
    async fn handle(&self, ctx: &mut FilterContext) -> SessionResult<Value>;
}

#[async_trait]
impl<F, Fut> RequestHandler for F
where
    F: Fn(&mut FilterContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = SessionResult<Value>> + Send,
{
    async fn handle(&self, ctx: &mut FilterContext) -> SessionResult<Value> {
        self(ctx).await
    }
}

/// A single link that wraps the rest of the chain.
#[async_trait]
pub trait HandlerFilter: Send + Sync {
    /// Run this filter's pre-handler logic, invoke `next` (or don't, to
    /// short-circuit), then run post-handler logic on the way back out.
    async fn call(&self, ctx: &mut FilterContext, next: &dyn RequestHandler) -> SessionResult<Value>;
}

struct Wrapped {
    filter: Arc<dyn HandlerFilter>,
    inner: Arc<dyn RequestHandler>,
}

#[async_trait]
impl RequestHandler for Wrapped {
    async fn handle(&self, ctx: &mut FilterContext) -> SessionResult<Value> {
        self.filter.call(ctx, self.inner.as_ref()).await
    }
}

/// Compose `filters` (outermost first, per their registration order) around
/// `base` into a single callable chain.
#[must_use]
pub fn compose(filters: &[Arc<dyn HandlerFilter>], base: Arc<dyn RequestHandler>) -> Arc<dyn RequestHandler> {
    filters.iter().rev().fold(base, |inner, filter| {
        Arc::new(Wrapped {
            filter: filter.clone(),
            inner,
        })
    })
}

/// Per-method registration: the base handler plus the filters wrapping it,
/// kept separately so a caller can inspect/replace the base without
/// rebuilding the filter list.
#[derive(Clone)]
pub struct MethodHandler {
    base: Arc<dyn RequestHandler>,
    filters: Vec<Arc<dyn HandlerFilter>>,
    composed: Arc<dyn RequestHandler>,
}

impl MethodHandler {
    /// Wrap `base` with `filters` (outermost first).
    #[must_use]
    pub fn new(base: Arc<dyn RequestHandler>, filters: Vec<Arc<dyn HandlerFilter>>) -> Self {
        let composed = compose(&filters, base.clone());
        Self { base, filters, composed }
    }

    /// Run the full composed chain.
    pub async fn dispatch(&self, ctx: &mut FilterContext) -> SessionResult<Value> {
        self.composed.handle(ctx).await
    }

    /// The filters wrapping this method's base handler, outermost first.
    #[must_use]
    pub fn filters(&self) -> &[Arc<dyn HandlerFilter>] {
        &self.filters
    }
}

/// Wraps the entire inbound-routing decision — allowed to handle a message
/// itself (by not calling `next`) for methods outside the normal
/// tool/prompt/resource vocabulary (§4.7).
#[async_trait]
pub trait IncomingMessageFilter: Send + Sync {
    /// Inspect `method`/`params` before routing proceeds. Returning
    /// `Some(result)` answers the request directly and skips normal
    /// routing; `None` lets the session route it as usual.
    async fn intercept(&self, method: &str, params: Option<&Value>) -> Option<SessionResult<Value>>;
}

/// Wraps every outbound message, able to suppress or augment it (§4.7).
#[async_trait]
pub trait OutgoingMessageFilter: Send + Sync {
    /// Transform or suppress an outbound JSON-RPC message. Returning `None`
    /// drops the message entirely.
    async fn filter(&self, message: mcp_core::JsonRpcMessage) -> Option<mcp_core::JsonRpcMessage>;
}

/// An authorization filter evaluating a caller-supplied policy against the
/// matched primitive's metadata bag (§4.7). Invocation calls that fail the
/// policy return [`SessionError::Forbidden`]; list handlers consult the same
/// policy through [`Self::allows`] to drop entries a caller could not
/// invoke anyway, so `tools/list` etc. never advertise what `tools/call`
/// would then refuse.
pub struct AuthorizationFilter {
    policy: Arc<dyn Fn(&FilterContext) -> bool + Send + Sync>,
    invoked: std::sync::atomic::AtomicBool,
}

impl AuthorizationFilter {
    /// Build a filter from a policy function: given the call's context,
    /// return whether the caller may proceed.
    #[must_use]
    pub fn new(policy: Arc<dyn Fn(&FilterContext) -> bool + Send + Sync>) -> Self {
        Self {
            policy,
            invoked: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Whether this filter has been invoked at least once since
    /// construction — the post-configuration self-check asserts this is
    /// `true` whenever a primitive carries authorization metadata, guarding
    /// against a misconfigured pipeline that never wired the filter in
    /// (§4.7).
    #[must_use]
    pub fn was_invoked(&self) -> bool {
        self.invoked.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Evaluate this filter's policy against `primitive` directly, without
    /// going through [`HandlerFilter::call`]'s next-handler machinery — used
    /// by list handlers to exclude entries the same policy would forbid
    /// invoking (§4.7, §8).
    #[must_use]
    pub fn allows(&self, method: &str, primitive: &PrimitiveMetadata, caller_identity: Option<&str>) -> bool {
        self.invoked.store(true, std::sync::atomic::Ordering::SeqCst);
        let ctx = FilterContext {
            method: method.to_string(),
            params: None,
            matched_primitive: Some(primitive.clone()),
            caller_identity: caller_identity.map(str::to_string),
            items: HashMap::new(),
            cancel: CancellationToken::new(),
        };
        (self.policy)(&ctx)
    }
}

#[async_trait]
impl HandlerFilter for AuthorizationFilter {
    async fn call(&self, ctx: &mut FilterContext, next: &dyn RequestHandler) -> SessionResult<Value> {
        self.invoked.store(true, std::sync::atomic::Ordering::SeqCst);
        if !(self.policy)(ctx) {
            let name = ctx
                .matched_primitive
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| ctx.method.clone());
            return Err(SessionError::Forbidden(format!("caller is not authorized to invoke '{name}'")));
        }
        next.handle(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct OrderFilter {
        label: &'static str,
        log: Arc<parking_lot::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl HandlerFilter for OrderFilter {
        async fn call(&self, ctx: &mut FilterContext, next: &dyn RequestHandler) -> SessionResult<Value> {
            self.log.lock().push(format!("pre:{}", self.label));
            let result = next.handle(ctx).await;
            self.log.lock().push(format!("post:{}", self.label));
            result
        }
    }

    #[tokio::test]
    async fn filters_run_outermost_first_onion_order() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let base: Arc<dyn RequestHandler> = Arc::new(|_ctx: &mut FilterContext| {
            let log = log.clone();
            async move {
                log.lock().push("base".to_string());
                Ok(Value::Null)
            }
        });
        let filters: Vec<Arc<dyn HandlerFilter>> = vec![
            Arc::new(OrderFilter { label: "f1", log: log.clone() }),
            Arc::new(OrderFilter { label: "f2", log: log.clone() }),
            Arc::new(OrderFilter { label: "f3", log: log.clone() }),
        ];
        let handler = MethodHandler::new(base, filters);
        let mut ctx = FilterContext::new("tools/call", None);
        handler.dispatch(&mut ctx).await.unwrap();

        let order = log.lock().clone();
        assert_eq!(
            order,
            vec!["pre:f1", "pre:f2", "pre:f3", "base", "post:f3", "post:f2", "post:f1"]
        );
    }

    #[tokio::test]
    async fn authorization_filter_rejects_when_policy_fails() {
        let base: Arc<dyn RequestHandler> = Arc::new(|_ctx: &mut FilterContext| async { Ok(Value::Null) });
        let filter = AuthorizationFilter::new(Arc::new(|_ctx: &FilterContext| false));
        let handler = MethodHandler::new(base, vec![Arc::new(filter)]);
        let mut ctx = FilterContext::new("tools/call", None);
        ctx.matched_primitive = Some(PrimitiveMetadata::new("danger_tool"));
        let err = handler.dispatch(&mut ctx).await.unwrap_err();
        assert!(matches!(err, SessionError::Forbidden(_)));
    }

    #[tokio::test]
    async fn authorization_filter_tracks_invocation() {
        let invoked = Arc::new(AtomicU32::new(0));
        let invoked_clone = invoked.clone();
        let filter = Arc::new(AuthorizationFilter::new(Arc::new(move |_ctx: &FilterContext| {
            invoked_clone.fetch_add(1, Ordering::SeqCst);
            true
        })));
        let base: Arc<dyn RequestHandler> = Arc::new(|_ctx: &mut FilterContext| async { Ok(Value::Null) });
        let handler = MethodHandler::new(base, vec![filter.clone()]);
        let mut ctx = FilterContext::new("tools/call", None);
        handler.dispatch(&mut ctx).await.unwrap();
        assert!(filter.was_invoked());
    }

    #[test]
    fn allows_evaluates_the_policy_against_a_standalone_primitive() {
        let filter = AuthorizationFilter::new(Arc::new(|ctx: &FilterContext| {
            ctx.matched_primitive.as_ref().map(|p| p.metadata.get("requires_scope").is_none()).unwrap_or(true)
        }));
        let open = PrimitiveMetadata::new("safe_tool");
        let guarded = PrimitiveMetadata::new("danger_tool").with("requires_scope", Value::from("admin"));
        assert!(filter.allows("tools/list", &open, None));
        assert!(!filter.allows("tools/list", &guarded, None));
        assert!(filter.was_invoked());
    }
}
