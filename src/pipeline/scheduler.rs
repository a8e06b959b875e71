//! Throttled periodic frame extraction and dispatch.

use crate::assets::MIN_POLL_PERIOD;
use crate::media::{SourceManager, StillFrame};
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::sink::FrameSink;
use crate::utils::{SubscriberList, SubscriptionId};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no sink assigned")]
    NoSink,
    #[error("sink '{0}' is not ready")]
    SinkNotReady(&'static str),
}

struct Schedule {
    interval: Duration,
    last_capture: Option<Instant>,
    sink: Option<Arc<dyn FrameSink>>,
    tick_cancel: Option<CancellationToken>,
}

struct SchedulerShared {
    media: SourceManager,
    health: Arc<PipelineHealth>,
    running: AtomicBool,
    schedule: Mutex<Schedule>,
    frame_subs: Mutex<SubscriberList<StillFrame>>,
}

/// Extracts one frame per interval from the media source and forwards it to
/// the active sink.
///
/// A fast polling tick bounds latency; the capture timestamp is recorded
/// before extraction begins, so a slow extraction can never let a second one
/// slip inside the same window. Frames with nowhere to go are dropped, never
/// queued; only the most recent frame matters for a live stream.
#[derive(Clone)]
pub struct FrameScheduler {
    shared: Arc<SchedulerShared>,
}

impl FrameScheduler {
    pub fn new(
        media: SourceManager,
        health: Arc<PipelineHealth>,
        interval: Duration,
    ) -> FrameScheduler {
        FrameScheduler {
            shared: Arc::new(SchedulerShared {
                media,
                health,
                running: AtomicBool::new(false),
                schedule: Mutex::new(Schedule {
                    interval,
                    last_capture: None,
                    sink: None,
                    tick_cancel: None,
                }),
                frame_subs: Mutex::new(SubscriberList::new()),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Change the throttle window for subsequent captures. A capture already
    /// in flight is unaffected.
    pub fn set_interval(&self, interval: Duration) {
        self.shared.schedule.lock().unwrap().interval = interval;
    }

    /// Replace the active sink.
    pub fn set_sink(&self, sink: Arc<dyn FrameSink>) {
        self.shared.schedule.lock().unwrap().sink = Some(sink);
    }

    /// Observe every successfully extracted frame.
    pub fn on_frame<F: Fn(&StillFrame) + Send + Sync + 'static>(
        &self,
        handler: F,
    ) -> SubscriptionId {
        self.shared
            .frame_subs
            .lock()
            .unwrap()
            .subscribe(Arc::new(handler))
    }

    pub fn off_frame(&self, id: SubscriptionId) -> bool {
        self.shared.frame_subs.lock().unwrap().unsubscribe(id)
    }

    /// Begin periodic capture. Refuses unless a sink is assigned and ready;
    /// capturing without a live destination only wastes the battery.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let cancel = {
            let mut schedule = self.shared.schedule.lock().unwrap();
            let sink = schedule.sink.clone().ok_or(SchedulerError::NoSink)?;
            if !sink.is_ready() {
                return Err(SchedulerError::SinkNotReady(sink.name()));
            }
            if self.shared.running.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            let cancel = CancellationToken::new();
            schedule.tick_cancel = Some(cancel.clone());
            cancel
        };

        info!("frame scheduler started");
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                let period = scheduler.poll_period();
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(period) => {}
                }
                if !scheduler.is_running() {
                    break;
                }
                scheduler.poll().await;
            }
        });
        Ok(())
    }

    /// Cancel the polling tick. Idempotent; an in-flight extraction's result
    /// is discarded on arrival.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(cancel) = self.shared.schedule.lock().unwrap().tick_cancel.take() {
            cancel.cancel();
        }
        info!("frame scheduler stopped");
    }

    fn poll_period(&self) -> Duration {
        let interval = self.shared.schedule.lock().unwrap().interval;
        (interval / 2).max(MIN_POLL_PERIOD)
    }

    /// One tick: if the interval has elapsed, extract a frame and forward it.
    pub async fn poll(&self) {
        if !self.is_running() {
            return;
        }
        let due = {
            let mut schedule = self.shared.schedule.lock().unwrap();
            let now = Instant::now();
            match schedule.last_capture {
                Some(last) if now.duration_since(last) < schedule.interval => false,
                _ => {
                    // claim the window before extraction begins
                    schedule.last_capture = Some(now);
                    true
                }
            }
        };
        if !due {
            return;
        }

        match self.shared.media.extract_frame().await {
            Ok(Some(frame)) => self.capture_one(frame).await,
            Ok(None) => debug!("no live source, skipping tick"),
            Err(err) => {
                warn!("frame extraction failed: {err}");
                self.shared.health.record_extraction_failure();
            }
        }
    }

    /// Forward one extracted frame to the active sink, re-checking that the
    /// schedule is still running so a frame that raced a stop is discarded.
    pub async fn capture_one(&self, frame: StillFrame) {
        if !self.is_running() {
            debug!("discarding frame extracted after stop");
            return;
        }

        let handlers = self.shared.frame_subs.lock().unwrap().handlers();
        for handler in handlers {
            handler(&frame);
        }

        let sink = self.shared.schedule.lock().unwrap().sink.clone();
        let Some(sink) = sink else {
            return;
        };
        if !sink.is_ready() {
            // no buffering: an unsendable frame is an expendable frame
            self.shared.health.record_frame_drop();
            debug!("{} sink not ready, frame dropped", sink.name());
            return;
        }

        match sink.dispatch(&frame).await {
            Ok(()) => self.shared.health.record_frame(frame.size()),
            Err(err) => {
                self.shared.health.record_frame_drop();
                warn!("{} sink rejected frame: {err}", sink.name());
            }
        }
    }
}

#[cfg(test)]
impl FrameScheduler {
    /// Flip the running flag without spawning the tick task, so tests can
    /// drive `poll` by hand.
    pub(crate) fn run_without_ticker(&self) {
        self.shared.running.store(true, Ordering::SeqCst);
    }
}
