//! Health monitoring and metrics for the streaming pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Health metrics for a pipeline
///
/// Tracks counters and timestamps to monitor pipeline health.
/// All fields use atomic operations for thread-safe access.
pub struct PipelineHealth {
    /// Frames dropped due to backpressure or delivery failure
    pub frame_drops: AtomicU64,

    /// Frame extraction failures (skip-and-continue)
    pub extraction_failures: AtomicU64,

    /// Transport-level errors observed
    pub network_errors: AtomicU64,

    /// Unexpected socket losses
    pub socket_losses: AtomicU64,

    /// Timestamp (as Unix microseconds) of the last dispatched frame
    pub last_frame_time: AtomicU64,

    /// Frames successfully dispatched to a sink
    pub frames_dispatched: AtomicU64,

    /// Total bytes of frame data dispatched
    pub bytes_dispatched: AtomicU64,
}

impl PipelineHealth {
    /// Create a new health metrics instance
    pub fn new() -> Self {
        Self {
            frame_drops: AtomicU64::new(0),
            extraction_failures: AtomicU64::new(0),
            network_errors: AtomicU64::new(0),
            socket_losses: AtomicU64::new(0),
            last_frame_time: AtomicU64::new(now_micros()),
            frames_dispatched: AtomicU64::new(0),
            bytes_dispatched: AtomicU64::new(0),
        }
    }

    /// Record a dropped frame
    pub fn record_frame_drop(&self) {
        self.frame_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an extraction failure
    pub fn record_extraction_failure(&self) {
        self.extraction_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a network error
    pub fn record_network_error(&self) {
        self.network_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an unexpected socket loss
    pub fn record_socket_loss(&self) {
        self.socket_losses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successfully dispatched frame
    pub fn record_frame(&self, size: usize) {
        self.last_frame_time.store(now_micros(), Ordering::Relaxed);
        self.frames_dispatched.fetch_add(1, Ordering::Relaxed);
        self.bytes_dispatched
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn frame_drops(&self) -> u64 {
        self.frame_drops.load(Ordering::Relaxed)
    }

    pub fn extraction_failures(&self) -> u64 {
        self.extraction_failures.load(Ordering::Relaxed)
    }

    pub fn network_errors(&self) -> u64 {
        self.network_errors.load(Ordering::Relaxed)
    }

    pub fn socket_losses(&self) -> u64 {
        self.socket_losses.load(Ordering::Relaxed)
    }

    pub fn last_frame_time(&self) -> u64 {
        self.last_frame_time.load(Ordering::Relaxed)
    }

    pub fn frames_dispatched(&self) -> u64 {
        self.frames_dispatched.load(Ordering::Relaxed)
    }

    pub fn bytes_dispatched(&self) -> u64 {
        self.bytes_dispatched.load(Ordering::Relaxed)
    }

    /// Frame drop rate as a percentage of dispatched frames
    pub fn frame_drop_rate(&self) -> f64 {
        let drops = self.frame_drops();
        let dispatched = self.frames_dispatched();
        if dispatched == 0 {
            return 0.0;
        }
        (drops as f64 / dispatched as f64) * 100.0
    }

    /// Check if the pipeline has stalled (no frames for given duration)
    pub fn is_stalled(&self, threshold: Duration) -> bool {
        let elapsed_micros = now_micros().saturating_sub(self.last_frame_time());
        elapsed_micros > threshold.as_micros() as u64
    }

    /// Get a summary of health metrics
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            frames_dispatched: self.frames_dispatched(),
            frame_drops: self.frame_drops(),
            extraction_failures: self.extraction_failures(),
            network_errors: self.network_errors(),
            socket_losses: self.socket_losses(),
            bytes_dispatched: self.bytes_dispatched(),
            frame_drop_rate: self.frame_drop_rate(),
        }
    }
}

impl Default for PipelineHealth {
    fn default() -> Self {
        Self::new()
    }
}

fn now_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// Snapshot of health metrics
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub frames_dispatched: u64,
    pub frame_drops: u64,
    pub extraction_failures: u64,
    pub network_errors: u64,
    pub socket_losses: u64,
    pub bytes_dispatched: u64,
    pub frame_drop_rate: f64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} frames ({} drops, {:.2}%), {} extraction failures, {} network errors, {} socket losses, {} bytes",
            self.frames_dispatched,
            self.frame_drops,
            self.frame_drop_rate,
            self.extraction_failures,
            self.network_errors,
            self.socket_losses,
            self.bytes_dispatched
        )
    }
}
