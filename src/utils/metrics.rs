//! Observability and Metrics
//!
//! Request-level counters for monitoring device communication health.
//!
//! Uses atomic counters for thread-safe metrics collection. Sessions record
//! into the process-wide instance returned by [`global_metrics`]; the counters
//! are observational only and never influence protocol behaviour.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use crate::error::ProtocolError;

/// Metrics collector for device protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Total handshake attempts
    pub handshakes_total: AtomicU64,
    /// Successful handshakes
    pub handshakes_success: AtomicU64,
    /// Failed handshakes
    pub handshakes_failed: AtomicU64,
    /// Total requests sent (including handshakes)
    pub requests_sent: AtomicU64,
    /// Requests that completed a full validated round trip
    pub requests_completed: AtomicU64,
    /// Total bytes sent
    pub bytes_sent: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
    /// Requests that got no reply in time
    pub timeouts: AtomicU64,
    /// Replies rejected by checksum or format validation
    pub integrity_errors: AtomicU64,
    /// Replies that failed decryption or payload checksum
    pub crypto_errors: AtomicU64,
    /// Replies carrying a non-zero device error code
    pub device_errors: AtomicU64,
    /// Send failures
    pub network_errors: AtomicU64,
    /// Discovery replies decoded into descriptors
    pub discovery_replies: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            handshakes_total: AtomicU64::new(0),
            handshakes_success: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            requests_sent: AtomicU64::new(0),
            requests_completed: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            integrity_errors: AtomicU64::new(0),
            crypto_errors: AtomicU64::new(0),
            device_errors: AtomicU64::new(0),
            network_errors: AtomicU64::new(0),
            discovery_replies: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a handshake attempt
    pub fn handshake_attempt(&self) {
        self.handshakes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful handshake
    pub fn handshake_success(&self) {
        self.handshakes_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed handshake
    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request frame sent
    pub fn request_sent(&self, byte_count: u64) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a reply frame received
    pub fn reply_received(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a validated round trip
    pub fn request_completed(&self) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decoded discovery reply
    pub fn discovery_reply(&self) {
        self.discovery_replies.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed request, bucketed by error kind
    pub fn request_failed(&self, error: &ProtocolError) {
        let counter = match error {
            ProtocolError::Timeout => &self.timeouts,
            ProtocolError::Checksum { .. } | ProtocolError::Malformed(_) => &self.integrity_errors,
            ProtocolError::Crypto(_) => &self.crypto_errors,
            ProtocolError::Device { .. } => &self.device_errors,
            ProtocolError::Network(_) | ProtocolError::Io(_) => &self.network_errors,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            handshakes_total: self.handshakes_total.load(Ordering::Relaxed),
            handshakes_success: self.handshakes_success.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            integrity_errors: self.integrity_errors.load(Ordering::Relaxed),
            crypto_errors: self.crypto_errors.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            network_errors: self.network_errors.load(Ordering::Relaxed),
            discovery_replies: self.discovery_replies.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            handshakes_total = snapshot.handshakes_total,
            handshakes_success = snapshot.handshakes_success,
            handshakes_failed = snapshot.handshakes_failed,
            requests_sent = snapshot.requests_sent,
            requests_completed = snapshot.requests_completed,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            timeouts = snapshot.timeouts,
            integrity_errors = snapshot.integrity_errors,
            crypto_errors = snapshot.crypto_errors,
            device_errors = snapshot.device_errors,
            network_errors = snapshot.network_errors,
            discovery_replies = snapshot.discovery_replies,
            uptime_seconds = snapshot.uptime_seconds,
            "Device protocol metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub handshakes_total: u64,
    pub handshakes_success: u64,
    pub handshakes_failed: u64,
    pub requests_sent: u64,
    pub requests_completed: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub timeouts: u64,
    pub integrity_errors: u64,
    pub crypto_errors: u64,
    pub device_errors: u64,
    pub network_errors: u64,
    pub discovery_replies: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring a round trip
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Time elapsed since the timer started
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_bucketed() {
        let metrics = Metrics::new();
        metrics.request_failed(&ProtocolError::Timeout);
        metrics.request_failed(&ProtocolError::Checksum {
            expected: 0,
            computed: 1,
        });
        metrics.request_failed(&ProtocolError::Crypto("bad".into()));
        metrics.request_failed(&ProtocolError::NotAuthenticated);

        let snap = metrics.snapshot();
        assert_eq!(snap.timeouts, 1);
        assert_eq!(snap.integrity_errors, 1);
        assert_eq!(snap.crypto_errors, 1);
        assert_eq!(snap.device_errors, 0);
    }

    #[test]
    fn test_byte_counters() {
        let metrics = Metrics::new();
        metrics.request_sent(0x48);
        metrics.reply_received(0x58);
        metrics.request_completed();

        let snap = metrics.snapshot();
        assert_eq!(snap.requests_sent, 1);
        assert_eq!(snap.bytes_sent, 0x48);
        assert_eq!(snap.bytes_received, 0x58);
        assert_eq!(snap.requests_completed, 1);
    }
}
