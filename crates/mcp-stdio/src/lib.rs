//! Newline-delimited JSON-RPC over stdin/stdout (§4.3).
//!
//! This is the transport a locally-spawned MCP server uses: a client spawns
//! the server as a child process, writes requests to its stdin, and reads
//! responses and notifications from its stdout. stderr is left untouched for
//! logging — `tracing`'s default subscriber writes there, so server-side logs
//! never collide with protocol traffic on stdout.
//!
//! Per the stdio transport rules, a message is exactly one line: it MUST NOT
//! contain an embedded newline, and anything written to stdout that isn't a
//! complete JSON-RPC message is a framing bug, not a log line in disguise.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::all
)]
#![deny(unsafe_code)]

mod transport;

pub use transport::StdioTransport;
