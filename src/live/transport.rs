//! Streaming transport behind the live session.
//!
//! The actor owns the write half through the [`LiveTransport`] trait and
//! receives incoming traffic as [`TransportEvent`]s on a channel fed by a
//! spawned read task. Tests substitute a mock transport; production uses the
//! WebSocket implementation below.

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::error::{ConnectError, TransportError};

/// Capacity of the incoming-event channel.
const EVENT_CAPACITY: usize = 64;

/// Lifecycle and traffic notifications from the transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete inbound frame, JSON text.
    Frame(String),
    /// The peer closed the connection.
    Closed { reason: String },
    /// The connection failed.
    Failed { reason: String },
}

/// Write half of a live connection.
#[async_trait]
pub trait LiveTransport: Send + 'static {
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Initiate teardown. Errors are irrelevant here; the read side reports
    /// the resulting close.
    async fn close(&mut self);
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport over tokio-tungstenite.
pub struct WsLiveTransport {
    sink: SplitSink<WsStream, WsMessage>,
}

/// Open a WebSocket connection and spawn its read task.
pub async fn connect_ws(
    url: &str,
) -> Result<(WsLiveTransport, mpsc::Receiver<TransportEvent>), ConnectError> {
    let (stream, _response) = connect_async(url).await?;
    debug!("WebSocket connection established");

    let (sink, mut read) = stream.split();
    let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);

    tokio::spawn(async move {
        loop {
            match read.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    if event_tx
                        .send(TransportEvent::Frame(text.to_string()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(Ok(WsMessage::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => {
                        if event_tx.send(TransportEvent::Frame(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        warn!("Dropping non-UTF-8 binary frame");
                    }
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "peer closed".to_string());
                    let _ = event_tx.send(TransportEvent::Closed { reason }).await;
                    break;
                }
                // tungstenite answers pings internally; nothing to do here
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                Some(Ok(WsMessage::Frame(_))) => {}
                Some(Err(e)) => {
                    let _ = event_tx
                        .send(TransportEvent::Failed {
                            reason: e.to_string(),
                        })
                        .await;
                    break;
                }
                None => {
                    let _ = event_tx
                        .send(TransportEvent::Closed {
                            reason: "stream ended".to_string(),
                        })
                        .await;
                    break;
                }
            }
        }
        debug!("WebSocket read task finished");
    });

    Ok((WsLiveTransport { sink }, event_rx))
}

#[async_trait]
impl LiveTransport for WsLiveTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.sink
            .send(WsMessage::Text(frame.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.send(WsMessage::Close(None)).await;
        let _ = self.sink.close().await;
    }
}
