//! WebSocket Transport
//!
//! Opens one duplex text channel to the game server. The socket itself is
//! driven by a reader and a writer task; callers only see two mpsc channels.

use std::future::Future;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

/// Default capacity of the frame channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket handshake or I/O error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection could not be established.
    #[error("connection refused: {0}")]
    Refused(String),
}

/// Something that happened on an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Frame(String),
    /// The peer closed the channel or it failed.
    Closed {
        /// Close reason or error, when known.
        reason: Option<String>,
    },
}

/// An open duplex channel.
///
/// Dropping `outbound` closes the underlying socket.
#[derive(Debug)]
pub struct TransportChannel {
    /// Frames to send.
    pub outbound: mpsc::Sender<String>,
    /// Frames received, ending with [`TransportEvent::Closed`] or channel end.
    pub inbound: mpsc::Receiver<TransportEvent>,
}

/// Opens transport channels.
pub trait Connector: Send + Sync + 'static {
    /// Establish a new channel to `url`.
    fn open(&self, url: &str) -> impl Future<Output = Result<TransportChannel, TransportError>> + Send;
}

// =============================================================================
// WEBSOCKET CONNECTOR
// =============================================================================

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    capacity: usize,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self { capacity: DEFAULT_CHANNEL_CAPACITY }
    }
}

impl WebSocketConnector {
    /// Create a connector with the given frame channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1) }
    }
}

impl Connector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<TransportChannel, TransportError> {
        let (ws_stream, _) = connect_async(url).await?;
        debug!("WebSocket connected to {}", url);

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(self.capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel::<TransportEvent>(self.capacity);

        // Reader task
        tokio::spawn(async move {
            let reason = loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(TransportEvent::Frame(text)).await.is_err() {
                            // Session superseded, nobody is listening.
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {}", e);
                        break Some(e.to_string());
                    }
                    None => break None,
                }
            };
            let _ = inbound_tx.send(TransportEvent::Closed { reason }).await;
            debug!("Reader task ended");
        });

        // Writer task
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!("Failed to send frame: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            debug!("Writer task ended");
        });

        Ok(TransportChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn test_refused_connection_is_an_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WebSocketConnector::default();
        let result = connector.open(&format!("ws://{}", addr)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"type":"user_count","count":3}"#.to_string()))
                .await
                .unwrap();
            let echoed = ws.next().await.unwrap().unwrap();
            ws.close(None).await.unwrap();
            echoed
        });

        let connector = WebSocketConnector::default();
        let mut channel = connector.open(&format!("ws://{}", addr)).await.unwrap();

        let first = channel.inbound.recv().await.unwrap();
        assert_eq!(first, TransportEvent::Frame(r#"{"type":"user_count","count":3}"#.to_string()));

        channel.outbound.send("hello".to_string()).await.unwrap();
        let echoed = server.await.unwrap();
        assert_eq!(echoed, Message::Text("hello".to_string()));

        let last = channel.inbound.recv().await.unwrap();
        assert!(matches!(last, TransportEvent::Closed { .. }));
    }
}
