//! The client side of an MCP connection (§4.10): a typed convenience API
//! over [`mcp_session::Session`] that drives the `initialize` handshake,
//! calls the tool/prompt/resource/task surface, and answers
//! server-initiated sampling/elicitation/roots requests.
//!
//! Transport-agnostic: build a [`ClientSession`] over any
//! [`mcp_transport::Transport`], or use [`process`] to spawn a server as a
//! child process and obtain an [`mcp_stdio::StdioTransport`] already wired
//! to it.

#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod capabilities;
pub mod error;
pub mod handlers;
pub mod process;
pub mod session;

pub use capabilities::negotiate;
pub use error::{ClientError, ClientResult};
pub use handlers::{ElicitationHandler, HandlerRegistry, RootsProvider, SamplingHandler};
pub use process::{spawn, ChildProcessConfig, ProcessExitDiagnostics, SpawnedProcess};
pub use session::ClientSession;
