//! Core JSON-RPC 2.0 message model shared by every MCP transport and session.
//!
//! This crate is deliberately thin: it knows nothing about tools, prompts,
//! resources, or any other MCP-specific vocabulary (that lives one layer up,
//! in `mcp-protocol`). It only models the wire-level envelope every MCP
//! message travels in, plus the identifiers used to correlate messages.

#![warn(missing_docs, rust_2018_idioms, clippy::all)]

mod error;
mod ids;
mod jsonrpc;

pub use error::{Error, ErrorCode, Result};
pub use ids::{ProgressToken, RequestId};
pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, JsonRpcVersion, ResponseId,
};
