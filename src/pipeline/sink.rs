//! Frame sinks: where captured frames go.

use crate::media::StillFrame;
use crate::recognition::ResultStore;
use crate::transport::{Channel, FrameEnvelope, RecognizeClient};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    /// The destination cannot take frames right now; the frame is dropped.
    #[error("sink is not ready")]
    NotReady,
    #[error("frame delivery failed: {0}")]
    Delivery(String),
}

/// Polymorphic destination for a captured frame. Exactly one sink is active
/// per scheduler at any time.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    /// Whether dispatching right now has a chance of delivering.
    fn is_ready(&self) -> bool;

    async fn dispatch(&self, frame: &StillFrame) -> Result<(), SinkError>;
}

/// Sends frames over the live channel as `detect_sign` envelopes.
pub struct ChannelSink {
    channel: Channel,
}

impl ChannelSink {
    pub fn new(channel: Channel) -> ChannelSink {
        ChannelSink { channel }
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn is_ready(&self) -> bool {
        self.channel.is_open()
    }

    async fn dispatch(&self, frame: &StillFrame) -> Result<(), SinkError> {
        if self.channel.send(&FrameEnvelope::detect_sign(frame)) {
            Ok(())
        } else {
            Err(SinkError::NotReady)
        }
    }
}

/// Pushes frames through the request/response recognize call and applies the
/// answer to the result store.
pub struct FallbackSink {
    client: RecognizeClient,
    results: Arc<ResultStore>,
}

impl FallbackSink {
    pub fn new(client: RecognizeClient, results: Arc<ResultStore>) -> FallbackSink {
        FallbackSink { client, results }
    }
}

#[async_trait]
impl FrameSink for FallbackSink {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn dispatch(&self, frame: &StillFrame) -> Result<(), SinkError> {
        let event = self
            .client
            .recognize_realtime(frame)
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;
        self.results.apply(&event);
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::Instant;

    /// Sink recording every dispatch, with a switchable ready flag.
    pub struct RecordingSink {
        ready: AtomicBool,
        dispatched: Mutex<Vec<Instant>>,
    }

    impl RecordingSink {
        pub fn new() -> RecordingSink {
            RecordingSink {
                ready: AtomicBool::new(true),
                dispatched: Mutex::new(Vec::new()),
            }
        }

        pub fn set_ready(&self, ready: bool) {
            self.ready.store(ready, Ordering::SeqCst);
        }

        pub fn dispatch_count(&self) -> usize {
            self.dispatched.lock().unwrap().len()
        }

        pub fn dispatch_times(&self) -> Vec<Instant> {
            self.dispatched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn dispatch(&self, _frame: &StillFrame) -> Result<(), SinkError> {
            if !self.is_ready() {
                return Err(SinkError::NotReady);
            }
            self.dispatched.lock().unwrap().push(Instant::now());
            Ok(())
        }
    }
}
