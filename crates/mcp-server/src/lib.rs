//! The server side of an MCP connection (§4.11): a [`builder::ServerBuilder`]
//! accumulates tools, prompts, resources, and cross-cutting policy, then
//! builds a [`session::ServerSession`] over any [`mcp_transport::Transport`].
//!
//! Built on [`mcp_session::Session`] the same way `mcp-client` is — neither
//! crate knows about transports or the wire format directly.

#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod builder;
pub mod capabilities;
pub mod completion;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod session;
pub mod subscriptions;
pub mod tasks;

pub use builder::ServerBuilder;
pub use capabilities::{negotiate_server_capabilities, CapabilityConfig};
pub use completion::CompletionHandler;
pub use error::{ServerError, ServerResult};
pub use registry::{
    PromptEntry, PromptHandler, Registry, ResourceEntry, ResourceHandler, ResourceTemplateEntry, ToolEntry, ToolHandler,
};
pub use session::ServerSession;
pub use subscriptions::Subscriptions;
pub use tasks::TaskDispatcher;
