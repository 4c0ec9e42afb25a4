//! Transport abstraction shared by every wire binding in the workspace.
//!
//! This crate defines what a transport is ([`Transport`]), not how any
//! particular one moves bytes — `mcp-stdio` and `mcp-streamable-http` each
//! provide an implementation, and `mcp-session` drives whichever one a
//! program was configured with through this same interface.

#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod error;
pub mod message;
pub mod metrics;
pub mod traits;
pub mod types;

pub use config::{validate_request_size, validate_response_size, LimitsConfig, TimeoutConfig};
pub use error::{TransportError, TransportResult};
pub use message::{TransportMessage, TransportMessageMetadata};
pub use metrics::{AtomicMetrics, TransportMetrics};
pub use traits::{MultiplexedTransport, Transport};
pub use types::{TransportCapabilities, TransportKind, TransportState};
