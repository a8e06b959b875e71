//! Transport module
//!
//! Provides the reconnecting duplex Channel to the recognition service,
//! the WebSocket implementation behind it, the envelope types resolved at
//! the transport boundary, and the request/response fallback client.

pub mod channel;
mod conn;
pub mod envelope;
pub mod fallback;
pub mod ws;

#[cfg(test)]
pub mod testing;

pub use channel::{Channel, ChannelState};
pub use conn::{ConnEvent, ConnectionRx, ConnectionTx, Connector};
pub use envelope::{FrameEnvelope, ServerEvent};
pub use fallback::RecognizeClient;
pub use ws::WsConnector;

use crate::assets::MANUAL_CLOSE_CODE;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Dial failure; drives the reconnect policy.
    #[error("connect failed: {0}")]
    Connect(String),
    /// Failure on an established connection.
    #[error("transport error: {0}")]
    Runtime(String),
}

/// Payload delivered to close observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseEvent {
    pub code: Option<u16>,
}

impl CloseEvent {
    pub fn is_manual(&self) -> bool {
        self.code == Some(MANUAL_CLOSE_CODE)
    }
}
