//! Timeout and size-limit configuration shared by every transport (§10.3).
//!
//! Transports read these at construction time; they are not renegotiable
//! mid-connection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Size limits enforced on inbound and outbound messages, ahead of parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum outbound message size in bytes. `None` means unlimited.
    pub max_request_size: Option<usize>,
    /// Maximum inbound message size in bytes. `None` means unlimited.
    pub max_response_size: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: Some(mcp_protocol::MAX_MESSAGE_SIZE),
            max_response_size: Some(mcp_protocol::MAX_MESSAGE_SIZE),
        }
    }
}

impl LimitsConfig {
    /// No limits at all. Only appropriate behind a trusted gateway that
    /// already enforces its own bounds.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_request_size: None,
            max_response_size: None,
        }
    }
}

/// How long to wait at each phase of a transport operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Time allowed to establish a connection.
    pub connect: Duration,
    /// Time allowed for a single request to receive its response.
    /// `None` disables the per-request deadline.
    pub request: Option<Duration>,
    /// Time allowed for a streaming read to produce its next chunk.
    pub read: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: Some(Duration::from_secs(60)),
            read: Some(Duration::from_secs(30)),
        }
    }
}

impl TimeoutConfig {
    /// Short timeouts, appropriate for a local stdio subprocess.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            connect: Duration::from_secs(5),
            request: Some(Duration::from_secs(10)),
            read: Some(Duration::from_secs(5)),
        }
    }

    /// Long timeouts, appropriate for task-augmented requests that may run
    /// for minutes (§9).
    #[must_use]
    pub const fn patient() -> Self {
        Self {
            connect: Duration::from_secs(60),
            request: Some(Duration::from_secs(300)),
            read: Some(Duration::from_secs(120)),
        }
    }
}

/// Validate an outbound message against `limits`.
///
/// # Errors
///
/// Returns [`crate::TransportError::MessageTooLarge`] if `size` exceeds the
/// configured request limit.
pub fn validate_request_size(
    size: usize,
    limits: &LimitsConfig,
) -> crate::error::TransportResult<()> {
    if let Some(max) = limits.max_request_size {
        if size > max {
            return Err(crate::error::TransportError::MessageTooLarge { size, max });
        }
    }
    Ok(())
}

/// Validate an inbound message against `limits`.
///
/// # Errors
///
/// Returns [`crate::TransportError::MessageTooLarge`] if `size` exceeds the
/// configured response limit.
pub fn validate_response_size(
    size: usize,
    limits: &LimitsConfig,
) -> crate::error::TransportResult<()> {
    if let Some(max) = limits.max_response_size {
        if size > max {
            return Err(crate::error::TransportError::MessageTooLarge { size, max });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_reject_oversized_request() {
        let limits = LimitsConfig::default();
        assert!(validate_request_size(1_000, &limits).is_ok());
        assert!(validate_request_size(64 * 1024 * 1024, &limits).is_err());
    }

    #[test]
    fn unlimited_accepts_anything() {
        let limits = LimitsConfig::unlimited();
        assert!(validate_response_size(100 * 1024 * 1024, &limits).is_ok());
    }
}
