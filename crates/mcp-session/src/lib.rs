//! The session layer: one dispatch loop per connected peer, sitting on top
//! of an [`mcp_transport::Transport`] and exposing request/notification
//! dispatch, the handler filter pipeline, primitive collections, a URI
//! template matcher for resource templates, and pluggable task storage.
//!
//! `mcp-client` and `mcp-server` both build on [`Session`]; neither knows
//! about transports directly.

#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod collections;
pub mod endpoint;
pub mod error;
pub mod filter;
pub mod ids;
pub mod notifications;
pub mod pending;
pub mod tasks;
pub mod tracing_ctx;
pub mod uri_template;

pub use collections::PrimitiveCollection;
pub use endpoint::{error_response, Session};
pub use error::{SessionError, SessionResult};
pub use filter::{
    AuthorizationFilter, FilterContext, HandlerFilter, IncomingMessageFilter, MethodHandler,
    OutgoingMessageFilter, PrimitiveMetadata, RequestHandler,
};
pub use ids::RequestIdAllocator;
pub use notifications::{NotificationHandler, NotificationRegistry};
pub use pending::PendingRequestTable;
pub use tasks::{InMemoryTaskStore, TaskStore, TaskStoreError, TaskStoreResult};
pub use uri_template::UriTemplate;
