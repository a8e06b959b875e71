//! Streaming pipeline coordinator
//!
//! Composes the media source, the transport channel and the frame scheduler,
//! and tears them down symmetrically. Channel observers only forward events
//! into a single run loop; all lifecycle decisions happen there or in the
//! visibility entry points.

use crate::assets::HEALTH_LOG_PERIOD;
use crate::config::Config;
use crate::media::{MediaError, SourceManager, StillFrame};
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::scheduler::FrameScheduler;
use crate::pipeline::sink::{ChannelSink, FrameSink};
use crate::pipeline::state::PipelineState;
use crate::recognition::{RecognitionResult, ResultStore};
use crate::transport::{Channel, ServerEvent};
use crate::utils::SubscriptionId;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

enum PipelineEvent {
    MediaReady,
    MediaFailed(MediaError),
    ChannelOpen,
    ChannelClosed(Option<u16>),
    ReconnectExhausted,
}

struct CoordinatorShared {
    channel: Channel,
    media: SourceManager,
    scheduler: FrameScheduler,
    results: Arc<ResultStore>,
    health: Arc<PipelineHealth>,
    state: Mutex<PipelineState>,
    connect_delay: Duration,
    channel_sink: Arc<dyn FrameSink>,
    fallback_sink: Mutex<Option<Arc<dyn FrameSink>>>,
    events: mpsc::Sender<PipelineEvent>,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct StreamCoordinator {
    shared: Arc<CoordinatorShared>,
}

impl StreamCoordinator {
    pub fn new(config: &Config, channel: Channel, media: SourceManager) -> StreamCoordinator {
        let results = Arc::new(ResultStore::new());
        let health = Arc::new(PipelineHealth::new());
        let scheduler = FrameScheduler::new(
            media.clone(),
            Arc::clone(&health),
            config.capture_interval,
        );
        let channel_sink: Arc<dyn FrameSink> = Arc::new(ChannelSink::new(channel.clone()));
        let (events_tx, events_rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();

        let coordinator = StreamCoordinator {
            shared: Arc::new(CoordinatorShared {
                channel,
                media,
                scheduler,
                results,
                health,
                state: Mutex::new(PipelineState::Inactive),
                connect_delay: config.connect_delay,
                channel_sink,
                fallback_sink: Mutex::new(None),
                events: events_tx,
                cancel,
            }),
        };

        coordinator.wire_channel();
        coordinator.spawn_run_loop(events_rx);
        coordinator.spawn_health_log();
        coordinator
    }

    /// Observers forward into the run loop; results and health are applied
    /// synchronously in the event-handling turn.
    fn wire_channel(&self) {
        let channel = &self.shared.channel;

        {
            let events = self.shared.events.clone();
            channel.on_open(move || {
                let _ = events.try_send(PipelineEvent::ChannelOpen);
            });
        }
        {
            let events = self.shared.events.clone();
            let health = Arc::clone(&self.shared.health);
            channel.on_close(move |event| {
                if !event.is_manual() {
                    health.record_socket_loss();
                }
                let _ = events.try_send(PipelineEvent::ChannelClosed(event.code));
            });
        }
        {
            let health = Arc::clone(&self.shared.health);
            channel.on_error(move |_err| {
                health.record_network_error();
            });
        }
        {
            let events = self.shared.events.clone();
            channel.on_terminal(move || {
                let _ = events.try_send(PipelineEvent::ReconnectExhausted);
            });
        }
        {
            let results = Arc::clone(&self.shared.results);
            channel.on_message(move |event| {
                results.apply(event);
                match event {
                    ServerEvent::Recognition { input, translation } => {
                        info!(
                            "recognized: input={} translation={}",
                            input.as_deref().unwrap_or("-"),
                            translation.as_deref().unwrap_or("-")
                        );
                    }
                    ServerEvent::ChatReply(text) => info!("reply: {text}"),
                }
            });
        }
    }

    fn spawn_run_loop(&self, mut events: mpsc::Receiver<PipelineEvent>) {
        let coordinator = self.clone();
        let cancel = self.shared.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        coordinator.handle_event(event).await;
                    }
                }
            }
        });
    }

    fn spawn_health_log(&self) {
        let health = Arc::clone(&self.shared.health);
        let cancel = self.shared.cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_LOG_PERIOD);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => info!("Stream pipeline: {}", health.summary()),
                }
            }
        });
    }

    // ── Presentation surface ────────────────────────────────────

    pub fn state(&self) -> PipelineState {
        *self.shared.state.lock().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.channel.is_open()
    }

    pub fn is_camera_running(&self) -> bool {
        self.shared.media.is_running()
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.scheduler.is_running()
    }

    pub fn results(&self) -> Arc<ResultStore> {
        Arc::clone(&self.shared.results)
    }

    pub fn snapshot(&self) -> RecognitionResult {
        self.shared.results.snapshot()
    }

    pub fn health(&self) -> Arc<PipelineHealth> {
        Arc::clone(&self.shared.health)
    }

    /// Observe every captured frame (the preview hook).
    pub fn on_frame<F: Fn(&StillFrame) + Send + Sync + 'static>(
        &self,
        handler: F,
    ) -> SubscriptionId {
        self.shared.scheduler.on_frame(handler)
    }

    pub fn off_frame(&self, id: SubscriptionId) -> bool {
        self.shared.scheduler.off_frame(id)
    }

    /// Install the sink used while the socket is down. Without one, capture
    /// pauses in the degraded state.
    pub fn set_fallback_sink(&self, sink: Arc<dyn FrameSink>) {
        *self.shared.fallback_sink.lock().unwrap() = Some(sink);
    }

    /// Screen visibility drives the whole pipeline.
    pub async fn set_visible(&self, visible: bool) {
        if visible {
            self.activate().await;
        } else {
            self.terminate().await;
        }
    }

    /// Stop the run loop and every pending timer. Call after the final
    /// `set_visible(false)`.
    pub fn close(&self) {
        self.shared.cancel.cancel();
    }

    // ── Lifecycle ───────────────────────────────────────────────

    async fn activate(&self) {
        if !self.transition(PipelineState::Initializing) {
            return;
        }
        info!(
            "[{}] pipeline activating",
            self.shared.channel.purpose()
        );

        // camera first: the preview must never wait for the network
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                let event = match coordinator.shared.media.start().await {
                    Ok(()) => PipelineEvent::MediaReady,
                    Err(err) => PipelineEvent::MediaFailed(err),
                };
                let _ = coordinator.shared.events.send(event).await;
            });
        }

        // the socket follows after a short delay
        {
            let coordinator = self.clone();
            let cancel = self.shared.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(coordinator.shared.connect_delay) => {}
                }
                // the pipeline may have been torn down while waiting
                if !coordinator.state().is_active() {
                    return;
                }
                if let Err(err) = coordinator.shared.channel.connect().await {
                    debug!("initial connect failed: {err}");
                }
            });
        }
    }

    async fn terminate(&self) {
        if !self.transition(PipelineState::Terminating) {
            return;
        }
        // order matters: stop capturing, then close the socket, then release
        // the camera
        self.shared.scheduler.stop();
        self.shared.channel.close();
        self.shared.media.stop().await;
        self.transition(PipelineState::Inactive);
        info!("pipeline inactive");
    }

    // ── Event handling ──────────────────────────────────────────

    async fn handle_event(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::MediaReady => {
                info!("camera running");
                if self.shared.channel.is_open() {
                    self.start_streaming();
                }
            }
            PipelineEvent::MediaFailed(err) => {
                match &err {
                    MediaError::Permission(status) => error!(
                        "camera permission {status}; grant camera access in system settings and retry"
                    ),
                    other => error!("camera unavailable: {other}"),
                }
                self.terminate().await;
            }
            PipelineEvent::ChannelOpen => {
                if self.shared.media.is_running() {
                    self.start_streaming();
                }
            }
            PipelineEvent::ChannelClosed(code) => self.degrade(code),
            PipelineEvent::ReconnectExhausted => {
                error!(
                    "recognition service unreachable; restart the stream once the network is back"
                );
            }
        }
    }

    fn start_streaming(&self) {
        {
            let state = self.shared.state.lock().unwrap();
            if !matches!(
                *state,
                PipelineState::Initializing | PipelineState::Degraded | PipelineState::Streaming
            ) {
                return;
            }
        }
        self.shared
            .scheduler
            .set_sink(Arc::clone(&self.shared.channel_sink));
        match self.shared.scheduler.start() {
            Ok(()) => {
                if self.transition(PipelineState::Streaming) {
                    info!("pipeline streaming");
                }
            }
            Err(err) => warn!("scheduler not started: {err}"),
        }
    }

    fn degrade(&self, code: Option<u16>) {
        {
            let state = self.shared.state.lock().unwrap();
            // closes while initializing belong to the channel's retry loop
            if *state != PipelineState::Streaming {
                return;
            }
        }
        let fallback = self.shared.fallback_sink.lock().unwrap().clone();
        match fallback {
            Some(sink) => {
                info!(
                    "socket lost (code {code:?}); falling back to http recognition"
                );
                self.shared.scheduler.set_sink(sink);
            }
            None => {
                info!("socket lost (code {code:?}); capture paused until reconnect");
                self.shared.scheduler.stop();
            }
        }
        self.transition(PipelineState::Degraded);
    }

    fn transition(&self, to: PipelineState) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        if *state == to {
            return false;
        }
        if !state.can_transition_to(&to) {
            debug!("ignoring pipeline transition {} -> {}", state, to);
            return false;
        }
        debug!("pipeline {} -> {}", state, to);
        *state = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamPurpose;
    use crate::media::testing::{CaptureCounters, FakeCapture, FakeGate};
    use crate::media::SourceManager;
    use crate::pipeline::sink::testing::RecordingSink;
    use crate::transport::testing::ScriptedConnector;
    use crate::transport::Connector;

    fn build(
        connector: &Arc<ScriptedConnector>,
        gate: FakeGate,
    ) -> (StreamCoordinator, Arc<CaptureCounters>) {
        let config = Config::new(StreamPurpose::Translation);
        let channel = Channel::new(
            config.ws_url.clone(),
            config.purpose,
            Arc::clone(connector) as Arc<dyn Connector>,
        );
        let capture = FakeCapture::new();
        let counters = capture.counters();
        let media = SourceManager::new(
            Box::new(capture),
            Box::new(gate),
            config.profile.clone(),
        );
        (StreamCoordinator::new(&config, channel, media), counters)
    }

    async fn pump() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn bring_up(coordinator: &StreamCoordinator) {
        coordinator.set_visible(true).await;
        // past the preview-first connect delay
        tokio::time::sleep(Duration::from_millis(400)).await;
        pump().await;
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_brings_the_pipeline_up_camera_first() {
        let connector = Arc::new(ScriptedConnector::new());
        let (coordinator, _counters) = build(&connector, FakeGate::granting());

        coordinator.set_visible(true).await;
        assert_eq!(coordinator.state(), PipelineState::Initializing);

        pump().await;
        assert!(coordinator.is_camera_running());
        // the socket is still inside its start delay
        assert!(!coordinator.is_connected());
        assert_eq!(connector.dials(), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        pump().await;
        assert!(coordinator.is_connected());
        assert!(coordinator.state().is_streaming());
        assert!(coordinator.is_capturing());

        coordinator.close();
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_is_symmetric_and_repeatable() {
        let connector = Arc::new(ScriptedConnector::new());
        let (coordinator, counters) = build(&connector, FakeGate::granting());

        bring_up(&coordinator).await;
        assert!(coordinator.state().is_streaming());

        coordinator.set_visible(false).await;
        pump().await;
        assert_eq!(coordinator.state(), PipelineState::Inactive);
        assert!(!coordinator.is_capturing());
        assert!(!coordinator.is_connected());
        assert_eq!(counters.track_stops(), 1);

        // a manual close never redials
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.dials(), 1);

        // the pipeline can come back
        bring_up(&coordinator).await;
        assert!(coordinator.state().is_streaming());
        assert_eq!(counters.opens(), 2);
        assert_eq!(connector.dials(), 2);

        coordinator.set_visible(false).await;
        coordinator.close();
    }

    #[tokio::test(start_paused = true)]
    async fn socket_loss_degrades_but_keeps_the_preview() {
        let connector = Arc::new(ScriptedConnector::new());
        let (coordinator, counters) = build(&connector, FakeGate::granting());

        bring_up(&coordinator).await;
        connector.link(0).push_closed(Some(1006));
        pump().await;

        assert_eq!(coordinator.state(), PipelineState::Degraded);
        assert!(coordinator.is_camera_running());
        assert!(!coordinator.is_capturing());
        assert_eq!(counters.track_stops(), 0);

        // the channel reconnects on its own and streaming resumes
        tokio::time::sleep(Duration::from_secs(3)).await;
        pump().await;
        assert!(coordinator.state().is_streaming());
        assert!(coordinator.is_capturing());

        coordinator.set_visible(false).await;
        coordinator.close();
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_policy_keeps_capturing_while_degraded() {
        let connector = Arc::new(ScriptedConnector::new());
        let (coordinator, _counters) = build(&connector, FakeGate::granting());
        let fallback = Arc::new(RecordingSink::new());
        coordinator.set_fallback_sink(fallback.clone());

        bring_up(&coordinator).await;
        connector.link(0).push_closed(Some(1006));
        pump().await;

        assert_eq!(coordinator.state(), PipelineState::Degraded);
        assert!(coordinator.is_capturing());

        // frames keep flowing, now into the fallback sink
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(fallback.dispatch_count() >= 1);

        // reopen swaps back to the channel sink
        tokio::time::sleep(Duration::from_secs(3)).await;
        pump().await;
        assert!(coordinator.state().is_streaming());
        let before = fallback.dispatch_count();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fallback.dispatch_count(), before);
        assert!(!connector.link(1).sent_messages().is_empty());

        coordinator.set_visible(false).await;
        coordinator.close();
    }

    #[tokio::test(start_paused = true)]
    async fn permission_failure_returns_to_inactive() {
        let connector = Arc::new(ScriptedConnector::new());
        let (coordinator, counters) = build(&connector, FakeGate::denying());

        coordinator.set_visible(true).await;
        pump().await;

        assert_eq!(coordinator.state(), PipelineState::Inactive);
        assert!(!coordinator.is_camera_running());
        assert_eq!(counters.opens(), 0);

        // the delayed connect noticed the teardown and never dialed
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(connector.dials(), 0);

        coordinator.close();
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_messages_update_results() {
        let connector = Arc::new(ScriptedConnector::new());
        let (coordinator, _counters) = build(&connector, FakeGate::granting());

        bring_up(&coordinator).await;
        connector
            .link(0)
            .push_text(r#"{"signInput":"wave","signTranslation":"hello"}"#);
        pump().await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.sign_input.as_deref(), Some("wave"));
        assert_eq!(snapshot.sign_translation.as_deref(), Some("hello"));

        coordinator.set_visible(false).await;
        coordinator.close();
    }
}
