//! Log-level control and progress reporting (§11 supplemented features).

use serde::{Deserialize, Serialize};

use crate::core::ProgressToken;

/// Severity levels a server can be asked to filter on, ordered from most to
/// least verbose per RFC 5424.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug level.
    Debug,
    /// Info level.
    Info,
    /// Notice level.
    Notice,
    /// Warning level.
    Warning,
    /// Error level.
    Error,
    /// Critical level.
    Critical,
    /// Alert level.
    Alert,
    /// Emergency level.
    Emergency,
}

/// `logging/setLevel` request: the client asks the server to only emit
/// `notifications/message` at or above `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLevelRequest {
    /// The minimum level to emit from now on.
    pub level: LogLevel,
}

/// `notifications/message`: a server-emitted log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingMessageNotification {
    /// Severity of this entry.
    pub level: LogLevel,
    /// The log payload; structured or a bare string.
    pub data: serde_json::Value,
    /// Which logger produced it, if the server has more than one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
}

/// `notifications/progress`: incremental progress on a request that carried
/// a `progressToken` in `params._meta` (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNotification {
    /// Correlates to the originating request's progress token.
    #[serde(rename = "progressToken")]
    pub progress_token: ProgressToken,
    /// Current progress; indeterminate if omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Total expected units of work, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Free-form status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Warning);
        assert!(LogLevel::Emergency > LogLevel::Critical);
    }

    #[test]
    fn level_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LogLevel::Warning).unwrap(),
            "\"warning\""
        );
    }
}
