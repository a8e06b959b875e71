//! In-memory connector for tests: scripted dial outcomes, inspectable links.

use crate::transport::TransportError;
use crate::transport::conn::{ConnEvent, ConnectionRx, ConnectionTx, Connector};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub enum DialOutcome {
    Succeed,
    Fail,
}

/// Handle onto one successful dial, for driving and inspecting it.
#[derive(Clone)]
pub struct LinkHandle {
    inbound: mpsc::UnboundedSender<ConnEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    shutdown: Arc<AtomicBool>,
}

impl LinkHandle {
    /// Feed a text message to the channel's read half.
    pub fn push_text(&self, raw: &str) {
        let _ = self.inbound.send(ConnEvent::Text(raw.to_string()));
    }

    /// Simulate the server closing the connection.
    pub fn push_closed(&self, code: Option<u16>) {
        let _ = self.inbound.send(ConnEvent::Closed { code });
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn was_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Connector whose dials follow a script; unscripted dials succeed.
pub struct ScriptedConnector {
    script: Mutex<VecDeque<DialOutcome>>,
    links: Mutex<Vec<LinkHandle>>,
    dial_times: Mutex<Vec<Instant>>,
}

impl ScriptedConnector {
    pub fn new() -> ScriptedConnector {
        ScriptedConnector {
            script: Mutex::new(VecDeque::new()),
            links: Mutex::new(Vec::new()),
            dial_times: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = DialOutcome>) {
        self.script.lock().unwrap().extend(outcomes);
    }

    pub fn dials(&self) -> usize {
        self.dial_times.lock().unwrap().len()
    }

    pub fn dial_times(&self) -> Vec<Instant> {
        self.dial_times.lock().unwrap().clone()
    }

    /// Handle for the n-th successful dial.
    pub fn link(&self, index: usize) -> LinkHandle {
        self.links.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        _endpoint: &str,
    ) -> Result<(Box<dyn ConnectionTx>, Box<dyn ConnectionRx>), TransportError> {
        self.dial_times.lock().unwrap().push(Instant::now());

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DialOutcome::Succeed);
        if let DialOutcome::Fail = outcome {
            return Err(TransportError::Connect("connection refused".into()));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        self.links.lock().unwrap().push(LinkHandle {
            inbound: inbound_tx,
            sent: Arc::clone(&sent),
            shutdown: Arc::clone(&shutdown),
        });

        let tx = TestTx { sent, shutdown };
        let rx = TestRx { inbound: inbound_rx };
        Ok((Box::new(tx), Box::new(rx)))
    }
}

struct TestTx {
    sent: Arc<Mutex<Vec<String>>>,
    shutdown: Arc<AtomicBool>,
}

#[async_trait]
impl ConnectionTx for TestTx {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(TransportError::Runtime("connection shut down".into()));
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

struct TestRx {
    inbound: mpsc::UnboundedReceiver<ConnEvent>,
}

#[async_trait]
impl ConnectionRx for TestRx {
    async fn recv(&mut self) -> Result<ConnEvent, TransportError> {
        match self.inbound.recv().await {
            Some(event) => Ok(event),
            None => Ok(ConnEvent::Closed { code: None }),
        }
    }
}
