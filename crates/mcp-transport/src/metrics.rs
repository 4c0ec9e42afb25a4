//! Lock-free transport metrics, sampled into a serializable snapshot for
//! diagnostics endpoints and logging (§10.1).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of a transport's counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportMetrics {
    /// Total bytes written.
    pub bytes_sent: u64,
    /// Total bytes read.
    pub bytes_received: u64,
    /// Total messages written.
    pub messages_sent: u64,
    /// Total messages read.
    pub messages_received: u64,
    /// Total connection attempts.
    pub connections: u64,
    /// Connection attempts that failed.
    pub failed_connections: u64,
    /// Exponential moving average of round-trip latency, in milliseconds.
    pub average_latency_ms: f64,
}

/// Atomic counters a transport updates from any task without locking.
/// `AtomicMetrics::snapshot` produces the serializable view.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    connections: AtomicU64,
    failed_connections: AtomicU64,
    avg_latency_us: AtomicU64,
}

impl AtomicMetrics {
    /// All counters start at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `n` bytes written.
    pub fn record_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `n` bytes read.
    pub fn record_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection attempt, successful or not.
    pub fn record_connection(&self, succeeded: bool) {
        self.connections.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.failed_connections.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Fold a new round-trip latency sample into the running average using
    /// an EMA with alpha = 0.1, saturating rather than overflowing under
    /// sustained high latency.
    pub fn record_latency_us(&self, latency_us: u64) {
        let current = self.avg_latency_us.load(Ordering::Relaxed);
        let updated = if current == 0 {
            latency_us
        } else {
            current.saturating_mul(9).saturating_add(latency_us) / 10
        };
        self.avg_latency_us.store(updated, Ordering::Relaxed);
    }

    /// A serializable snapshot of the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> TransportMetrics {
        TransportMetrics {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            failed_connections: self.failed_connections.load(Ordering::Relaxed),
            average_latency_ms: self.avg_latency_us.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate() {
        let metrics = AtomicMetrics::new();
        metrics.record_sent(100);
        metrics.record_sent(50);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bytes_sent, 150);
        assert_eq!(snapshot.messages_sent, 2);
    }

    #[test]
    fn latency_ema_does_not_overflow_under_sustained_max() {
        let metrics = AtomicMetrics::new();
        for _ in 0..1_000 {
            metrics.record_latency_us(u64::MAX / 5);
        }
        let snapshot = metrics.snapshot();
        assert!(snapshot.average_latency_ms.is_finite());
        assert!(snapshot.average_latency_ms > 0.0);
    }

    #[test]
    fn failed_connection_counted_separately() {
        let metrics = AtomicMetrics::new();
        metrics.record_connection(true);
        metrics.record_connection(false);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections, 2);
        assert_eq!(snapshot.failed_connections, 1);
    }
}
