//! MCP domain types layered on top of [`mcp_core`]'s JSON-RPC envelope.
//!
//! This crate defines the application-level vocabulary of the Model Context
//! Protocol: capability negotiation, content blocks, and the tool/prompt/
//! resource primitives, plus the tasks and elicitation extensions. It does
//! not know about transports or sessions — those consume these types.

#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod capabilities;
pub mod completion;
pub mod content;
pub mod core;
pub mod elicitation;
pub mod initialization;
pub mod logging;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod tasks;
pub mod tools;

pub use mcp_core::{
    Error as CoreError, ErrorCode, JsonRpcError, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ProgressToken, RequestId,
};

/// The protocol version this crate implements, exchanged verbatim during
/// `initialize` (§4.6).
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// An upper bound on a single JSON-RPC message's serialized size, applied by
/// transports before attempting to parse (§4.1, §4.3).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
