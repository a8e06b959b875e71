//! WebSocket connector backed by async-tungstenite.

use crate::transport::TransportError;
use crate::transport::conn::{ConnEvent, ConnectionRx, ConnectionTx, Connector};
use async_trait::async_trait;
use async_tungstenite::WebSocketStream;
use async_tungstenite::tokio::{ConnectStream, connect_async};
use async_tungstenite::tungstenite::Message;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::debug;

pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        endpoint: &str,
    ) -> Result<(Box<dyn ConnectionTx>, Box<dyn ConnectionRx>), TransportError> {
        let (stream, _response) = connect_async(endpoint)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (sink, stream) = StreamExt::split(stream);
        Ok((Box::new(WsSender { sink }), Box::new(WsReceiver { stream })))
    }
}

struct WsSender {
    sink: SplitSink<WebSocketStream<ConnectStream>, Message>,
}

#[async_trait]
impl ConnectionTx for WsSender {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::Runtime(e.to_string()))
    }

    async fn shutdown(&mut self) {
        let _ = self.sink.close().await;
    }
}

struct WsReceiver {
    stream: SplitStream<WebSocketStream<ConnectStream>>,
}

#[async_trait]
impl ConnectionRx for WsReceiver {
    async fn recv(&mut self) -> Result<ConnEvent, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(ConnEvent::Text(text.to_string())),
                Some(Ok(Message::Close(frame))) => {
                    return Ok(ConnEvent::Closed {
                        code: frame.map(|f| u16::from(f.code)),
                    });
                }
                // ping/pong replies are handled by the protocol layer
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(other)) => {
                    debug!("ignoring non-text frame ({} bytes)", other.len());
                    continue;
                }
                Some(Err(err)) => return Err(TransportError::Runtime(err.to_string())),
                None => return Ok(ConnEvent::Closed { code: None }),
            }
        }
    }
}
