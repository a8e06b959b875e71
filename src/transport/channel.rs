//! Reconnecting duplex channel to the recognition service.
//!
//! One `Channel` exists per logical stream purpose. It owns at most one
//! underlying connection at any time; an unexpected close or a failed dial
//! schedules bounded retries, a manual close never does. Observers register
//! on ordered lists and fire synchronously, in registration order, within the
//! event-handling turn.

use crate::assets::{MANUAL_CLOSE_CODE, MAX_RECONNECT_ATTEMPTS, OUTBOUND_QUEUE, RECONNECT_DELAY};
use crate::config::StreamPurpose;
use crate::transport::conn::{ConnEvent, ConnectionRx, ConnectionTx, Connector};
use crate::transport::envelope::{self, ServerEvent};
use crate::transport::{CloseEvent, TransportError};
use crate::utils::{Generation, SubscriberList, SubscriptionId};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Connecting,
    Open,
    Closing,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Closed => write!(f, "Closed"),
            ChannelState::Connecting => write!(f, "Connecting"),
            ChannelState::Open => write!(f, "Open"),
            ChannelState::Closing => write!(f, "Closing"),
        }
    }
}

#[derive(Default)]
struct Observers {
    open: SubscriberList<()>,
    message: SubscriberList<ServerEvent>,
    error: SubscriberList<TransportError>,
    close: SubscriberList<CloseEvent>,
    terminal: SubscriberList<()>,
}

struct Inner {
    state: ChannelState,
    outbound: Option<mpsc::Sender<String>>,
    conn_cancel: Option<CancellationToken>,
    reconnect_timer: Option<CancellationToken>,
    reconnect_attempts: u32,
    manual_close: bool,
    terminal_notified: bool,
}

struct ChannelShared {
    endpoint: String,
    purpose: StreamPurpose,
    connector: Arc<dyn Connector>,
    generation: Generation,
    inner: Mutex<Inner>,
    observers: Mutex<Observers>,
}

#[derive(Clone)]
pub struct Channel {
    shared: Arc<ChannelShared>,
}

impl Channel {
    pub fn new(
        endpoint: impl Into<String>,
        purpose: StreamPurpose,
        connector: Arc<dyn Connector>,
    ) -> Channel {
        Channel {
            shared: Arc::new(ChannelShared {
                endpoint: endpoint.into(),
                purpose,
                connector,
                generation: Generation::new(),
                inner: Mutex::new(Inner {
                    state: ChannelState::Closed,
                    outbound: None,
                    conn_cancel: None,
                    reconnect_timer: None,
                    reconnect_attempts: 0,
                    manual_close: false,
                    terminal_notified: false,
                }),
                observers: Mutex::new(Observers::default()),
            }),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.shared.inner.lock().unwrap().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    pub fn purpose(&self) -> StreamPurpose {
        self.shared.purpose
    }

    // ── Observer registration ───────────────────────────────────

    pub fn on_open<F: Fn() + Send + Sync + 'static>(&self, handler: F) -> SubscriptionId {
        self.shared
            .observers
            .lock()
            .unwrap()
            .open
            .subscribe(Arc::new(move |_: &()| handler()))
    }

    pub fn off_open(&self, id: SubscriptionId) -> bool {
        self.shared.observers.lock().unwrap().open.unsubscribe(id)
    }

    pub fn on_message<F: Fn(&ServerEvent) + Send + Sync + 'static>(
        &self,
        handler: F,
    ) -> SubscriptionId {
        self.shared
            .observers
            .lock()
            .unwrap()
            .message
            .subscribe(Arc::new(handler))
    }

    pub fn off_message(&self, id: SubscriptionId) -> bool {
        self.shared
            .observers
            .lock()
            .unwrap()
            .message
            .unsubscribe(id)
    }

    pub fn on_error<F: Fn(&TransportError) + Send + Sync + 'static>(
        &self,
        handler: F,
    ) -> SubscriptionId {
        self.shared
            .observers
            .lock()
            .unwrap()
            .error
            .subscribe(Arc::new(handler))
    }

    pub fn off_error(&self, id: SubscriptionId) -> bool {
        self.shared.observers.lock().unwrap().error.unsubscribe(id)
    }

    pub fn on_close<F: Fn(&CloseEvent) + Send + Sync + 'static>(
        &self,
        handler: F,
    ) -> SubscriptionId {
        self.shared
            .observers
            .lock()
            .unwrap()
            .close
            .subscribe(Arc::new(handler))
    }

    pub fn off_close(&self, id: SubscriptionId) -> bool {
        self.shared.observers.lock().unwrap().close.unsubscribe(id)
    }

    /// Fires at most once per failure episode, when the reconnect budget is
    /// exhausted.
    pub fn on_terminal<F: Fn() + Send + Sync + 'static>(&self, handler: F) -> SubscriptionId {
        self.shared
            .observers
            .lock()
            .unwrap()
            .terminal
            .subscribe(Arc::new(move |_: &()| handler()))
    }

    pub fn off_terminal(&self, id: SubscriptionId) -> bool {
        self.shared
            .observers
            .lock()
            .unwrap()
            .terminal
            .unsubscribe(id)
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Open the channel. Idempotent when already open. Resolves once the
    /// connection is established, or with the dial error (which also feeds
    /// the reconnect policy).
    pub async fn connect(&self) -> Result<(), TransportError> {
        let tag = {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.state == ChannelState::Open {
                return Ok(());
            }
            // fully discard any previous connection before dialing a new one
            if let Some(cancel) = inner.conn_cancel.take() {
                cancel.cancel();
            }
            if let Some(timer) = inner.reconnect_timer.take() {
                timer.cancel();
            }
            inner.outbound = None;
            inner.manual_close = false;
            inner.state = ChannelState::Connecting;
            self.shared.generation.bump()
        };

        debug!(
            "[{}] connecting to {}",
            self.shared.purpose, self.shared.endpoint
        );

        match self.shared.connector.connect(&self.shared.endpoint).await {
            Ok((tx_half, rx_half)) => {
                let (outbound_rx, cancel) = {
                    let mut inner = self.shared.inner.lock().unwrap();
                    if !self.shared.generation.still(tag) {
                        return Err(TransportError::Connect(
                            "connection attempt superseded".into(),
                        ));
                    }
                    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
                    let cancel = CancellationToken::new();
                    inner.outbound = Some(tx);
                    inner.conn_cancel = Some(cancel.clone());
                    inner.state = ChannelState::Open;
                    inner.reconnect_attempts = 0;
                    inner.terminal_notified = false;
                    (rx, cancel)
                };
                info!("[{}] connected", self.shared.purpose);
                self.dispatch_open();
                self.spawn_connection(tx_half, rx_half, outbound_rx, tag, cancel);
                Ok(())
            }
            Err(err) => {
                {
                    let mut inner = self.shared.inner.lock().unwrap();
                    if !self.shared.generation.still(tag) {
                        return Err(err);
                    }
                    inner.state = ChannelState::Closed;
                }
                warn!("[{}] connect failed: {err}", self.shared.purpose);
                self.dispatch_error(&err);
                self.maybe_schedule_reconnect();
                Err(err)
            }
        }
    }

    /// Serialize and enqueue a message. Only works while open; otherwise this
    /// is a no-op reporting a local failure.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        let outbound = {
            let inner = self.shared.inner.lock().unwrap();
            if inner.state != ChannelState::Open {
                warn!(
                    "[{}] not connected ({}), message dropped",
                    self.shared.purpose, inner.state
                );
                return false;
            }
            inner.outbound.clone()
        };
        let Some(outbound) = outbound else {
            return false;
        };

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(err) => {
                error!("[{}] failed to serialize message: {err}", self.shared.purpose);
                return false;
            }
        };
        match outbound.try_send(text) {
            Ok(()) => true,
            Err(_) => {
                warn!("[{}] outbound queue unavailable, message dropped", self.shared.purpose);
                false
            }
        }
    }

    /// Tear the channel down. A manual close cancels any pending reconnect
    /// and never triggers reconnection.
    pub fn close(&self) {
        enum Teardown {
            Cancel(CancellationToken),
            Dispatch,
            Nothing,
        }

        let teardown = {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.manual_close = true;
            if let Some(timer) = inner.reconnect_timer.take() {
                timer.cancel();
            }
            match inner.conn_cancel.take() {
                Some(cancel) => {
                    inner.state = ChannelState::Closing;
                    Teardown::Cancel(cancel)
                }
                None if inner.state == ChannelState::Closed => Teardown::Nothing,
                None => {
                    // a dial may still be in flight; invalidate its continuation
                    self.shared.generation.bump();
                    inner.state = ChannelState::Closed;
                    inner.outbound = None;
                    Teardown::Dispatch
                }
            }
        };

        match teardown {
            // the connection task emits the close event on its way out
            Teardown::Cancel(cancel) => cancel.cancel(),
            Teardown::Dispatch => {
                info!("[{}] closed", self.shared.purpose);
                self.dispatch_close(&CloseEvent {
                    code: Some(MANUAL_CLOSE_CODE),
                });
            }
            Teardown::Nothing => {}
        }
    }

    // ── Connection task ─────────────────────────────────────────

    fn spawn_connection(
        &self,
        mut tx_half: Box<dyn ConnectionTx>,
        mut rx_half: Box<dyn ConnectionRx>,
        mut outbound: mpsc::Receiver<String>,
        tag: u64,
        cancel: CancellationToken,
    ) {
        let channel = self.clone();
        tokio::spawn(async move {
            let close_code = loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tx_half.shutdown().await;
                        break Some(MANUAL_CLOSE_CODE);
                    }
                    queued = outbound.recv() => {
                        match queued {
                            Some(text) => {
                                if let Err(err) = tx_half.send(text).await {
                                    channel.dispatch_error(&err);
                                    break None;
                                }
                            }
                            None => {
                                tx_half.shutdown().await;
                                break Some(MANUAL_CLOSE_CODE);
                            }
                        }
                    }
                    event = rx_half.recv() => {
                        match event {
                            Ok(ConnEvent::Text(raw)) => channel.dispatch_text(&raw),
                            Ok(ConnEvent::Closed { code }) => break code,
                            Err(err) => {
                                channel.dispatch_error(&err);
                                break None;
                            }
                        }
                    }
                }
            };
            channel.finish_connection(tag, close_code);
        });
    }

    fn finish_connection(&self, tag: u64, code: Option<u16>) {
        let manual = {
            let mut inner = self.shared.inner.lock().unwrap();
            if !self.shared.generation.still(tag) {
                // a newer connection owns the channel now
                return;
            }
            inner.outbound = None;
            inner.conn_cancel = None;
            inner.state = ChannelState::Closed;
            inner.manual_close
        };

        info!(
            "[{}] connection closed (code {:?})",
            self.shared.purpose, code
        );
        self.dispatch_close(&CloseEvent { code });

        if !manual && code != Some(MANUAL_CLOSE_CODE) {
            self.maybe_schedule_reconnect();
        }
    }

    // ── Reconnect policy ────────────────────────────────────────

    fn maybe_schedule_reconnect(&self) {
        enum Plan {
            Retry {
                attempt: u32,
                timer: CancellationToken,
                tag: u64,
            },
            Terminal,
            Nothing,
        }

        let plan = {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.manual_close {
                Plan::Nothing
            } else if inner.reconnect_attempts >= MAX_RECONNECT_ATTEMPTS {
                if inner.terminal_notified {
                    Plan::Nothing
                } else {
                    inner.terminal_notified = true;
                    Plan::Terminal
                }
            } else {
                inner.reconnect_attempts += 1;
                let timer = CancellationToken::new();
                inner.reconnect_timer = Some(timer.clone());
                Plan::Retry {
                    attempt: inner.reconnect_attempts,
                    timer,
                    tag: self.shared.generation.current(),
                }
            }
        };

        match plan {
            Plan::Nothing => {}
            Plan::Terminal => {
                error!(
                    "[{}] giving up after {MAX_RECONNECT_ATTEMPTS} reconnect attempts",
                    self.shared.purpose
                );
                self.dispatch_terminal();
            }
            Plan::Retry {
                attempt,
                timer,
                tag,
            } => {
                info!(
                    "[{}] reconnect attempt {attempt}/{MAX_RECONNECT_ATTEMPTS} in {:?}",
                    self.shared.purpose, RECONNECT_DELAY
                );
                let channel = self.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = timer.cancelled() => return,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                    // the channel may have been closed or redialed while waiting
                    if !channel.shared.generation.still(tag) {
                        return;
                    }
                    if let Err(err) = channel.connect().await {
                        debug!(
                            "[{}] reconnect attempt {attempt} failed: {err}",
                            channel.shared.purpose
                        );
                    }
                });
            }
        }
    }

    // ── Observer dispatch ───────────────────────────────────────

    fn dispatch_open(&self) {
        let handlers = self.shared.observers.lock().unwrap().open.handlers();
        for handler in handlers {
            handler(&());
        }
    }

    fn dispatch_message(&self, event: &ServerEvent) {
        let handlers = self.shared.observers.lock().unwrap().message.handlers();
        for handler in handlers {
            handler(event);
        }
    }

    fn dispatch_error(&self, err: &TransportError) {
        let handlers = self.shared.observers.lock().unwrap().error.handlers();
        for handler in handlers {
            handler(err);
        }
    }

    fn dispatch_close(&self, event: &CloseEvent) {
        let handlers = self.shared.observers.lock().unwrap().close.handlers();
        for handler in handlers {
            handler(event);
        }
    }

    fn dispatch_terminal(&self) {
        let handlers = self.shared.observers.lock().unwrap().terminal.handlers();
        for handler in handlers {
            handler(&());
        }
    }

    /// Parse failures are local: logged, never dispatched, and they do not
    /// affect connection state.
    fn dispatch_text(&self, raw: &str) {
        match envelope::resolve(raw) {
            Ok(Some(event)) => self.dispatch_message(&event),
            Ok(None) => debug!(
                "[{}] inbound message had no recognized fields",
                self.shared.purpose
            ),
            Err(err) => warn!(
                "[{}] failed to parse inbound message: {err}",
                self.shared.purpose
            ),
        }
    }

    #[cfg(test)]
    pub(crate) fn reconnect_attempts(&self) -> u32 {
        self.shared.inner.lock().unwrap().reconnect_attempts
    }
}
