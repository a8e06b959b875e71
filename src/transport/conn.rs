//! Traits for the underlying duplex connection

use crate::transport::TransportError;
use async_trait::async_trait;

/// What the read half of a connection can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnEvent {
    Text(String),
    Closed { code: Option<u16> },
}

/// Dials an endpoint and yields the two halves of a duplex connection.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
    ) -> Result<(Box<dyn ConnectionTx>, Box<dyn ConnectionRx>), TransportError>;
}

#[async_trait]
pub trait ConnectionTx: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Initiate a clean shutdown of the connection.
    async fn shutdown(&mut self);
}

#[async_trait]
pub trait ConnectionRx: Send {
    async fn recv(&mut self) -> Result<ConnEvent, TransportError>;
}
