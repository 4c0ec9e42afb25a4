//! Streamable HTTP transport (§4.5): POST/GET/DELETE on one mount path,
//! session-scoped state, and resumable SSE backed by an [`event_store`].
//!
//! This crate is deliberately agnostic to `mcp-session`: [`transport::router`]
//! hands the caller one [`transport::HttpServerTransport`] per accepted
//! session through a callback, and the caller decides what drives it. That
//! keeps this crate's dependency graph a leaf, the same shape `mcp-stdio`
//! takes.

#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod event_store;
pub mod session;
pub mod transport;

pub use client::{HttpClientConfig, HttpClientTransport};
pub use config::StreamableHttpConfig;
pub use error::{StreamableError, StreamableResult};
pub use event_store::{DeliveredEvent, EventStore, InMemoryEventStore, StoredEvent};
pub use session::{HttpSessionState, SessionRegistry};
pub use transport::{router, HttpServerTransport, NewSessionFn};
