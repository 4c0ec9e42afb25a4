//! Configuration for the Streamable HTTP transport (§4.5).

use std::time::Duration;

/// Tunables governing session lifetime, resumability, and stateless mode.
#[derive(Debug, Clone)]
pub struct StreamableHttpConfig {
    /// Path the three MCP verbs (GET/POST/DELETE) are mounted on.
    pub mount_path: String,

    /// Interval between SSE keep-alive comments, to hold intermediary
    /// proxies open.
    pub keep_alive: Duration,

    /// How long a session may sit idle (no requests, no open GET stream)
    /// before it is evicted.
    pub idle_timeout: Duration,

    /// The most sessions this deployment keeps live at once; the oldest
    /// idle session is evicted to make room for a new one (§4.5). A critical
    /// log is emitted whenever eviction happens for this reason rather than
    /// for exceeding `idle_timeout`.
    pub max_sessions: usize,

    /// Maximum events retained per `(sessionId, streamId)` for resumption.
    pub max_events_per_stream: usize,

    /// Stateless mode: disables GET, DELETE, and all server-initiated
    /// traffic; every POST is handled as a fresh session with no stored
    /// state and `Mcp-Session-Id` is never emitted. Enables horizontal
    /// load-balancing without session affinity.
    pub stateless: bool,

    /// Maximum accepted request body size in bytes.
    pub max_body_size: usize,

    /// When set, only these `Origin` header values are accepted; `None`
    /// accepts any origin (appropriate only behind a trusted gateway).
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for StreamableHttpConfig {
    fn default() -> Self {
        Self {
            mount_path: "/mcp".to_string(),
            keep_alive: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(2 * 60 * 60),
            max_sessions: 10_000,
            max_events_per_stream: 1_000,
            stateless: false,
            max_body_size: 4 * 1024 * 1024,
            allowed_origins: None,
        }
    }
}

impl StreamableHttpConfig {
    /// A stateless deployment suited to horizontal scaling: every POST is a
    /// self-contained request/response, no session state is kept between
    /// calls, and GET/DELETE are rejected.
    #[must_use]
    pub fn stateless() -> Self {
        Self { stateless: true, ..Self::default() }
    }

    /// Restrict accepted `Origin` headers to `origins`.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_origins = Some(origins.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `origin` is acceptable under this configuration.
    #[must_use]
    pub fn accepts_origin(&self, origin: Option<&str>) -> bool {
        match &self.allowed_origins {
            None => true,
            Some(allowed) => origin.is_some_and(|o| allowed.iter().any(|a| a == o)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_accepts_any_origin() {
        let config = StreamableHttpConfig::default();
        assert!(config.accepts_origin(Some("https://evil.example")));
        assert!(config.accepts_origin(None));
    }

    #[test]
    fn restricted_origins_reject_unlisted_and_missing_origin() {
        let config = StreamableHttpConfig::default().with_allowed_origins(["https://good.example"]);
        assert!(config.accepts_origin(Some("https://good.example")));
        assert!(!config.accepts_origin(Some("https://evil.example")));
        assert!(!config.accepts_origin(None));
    }

    #[test]
    fn stateless_preset_disables_stateful_features() {
        let config = StreamableHttpConfig::stateless();
        assert!(config.stateless);
    }
}
