//! Channel abstraction driven by the session manager
//!
//! A `Transport` opens one bidirectional text channel. The session manager
//! only ever sees a `Connection`: an outbound sender of text frames and an
//! inbound stream of `ChannelEvent`s ending in `Closed`.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::Result;
use crate::logging::get_logger;

/// What a channel reports to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One inbound text frame
    Frame(String),
    /// The channel is gone; nothing follows this event
    Closed { reason: Option<String> },
}

/// An established channel
#[derive(Debug)]
pub struct Connection {
    /// Text frames to transmit. Dropping it closes the channel.
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<ChannelEvent>,
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Connection>;
}

/// WebSocket client transport
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<Connection> {
        let logger = get_logger("transport");
        let (stream, _response) = connect_async(url).await?;
        logger.debug(&format!("WebSocket handshake with {} complete", url));

        let (mut write, mut read) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ChannelEvent>();

        let writer_events = inbound_tx.clone();
        let writer_logger = logger.clone();
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    writer_logger.debug(&format!("WebSocket write failed: {}", e));
                    let _ = writer_events.send(ChannelEvent::Closed {
                        reason: Some(format!("write failed: {}", e)),
                    });
                    return;
                }
            }
            // Owner dropped the sender
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            let reason = loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(ChannelEvent::Frame(text)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.to_string());
                    }
                    // binary frames are not part of the protocol; ping/pong handled by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            };
            logger.debug(&format!("WebSocket reader finished: {:?}", reason));
            let _ = inbound_tx.send(ChannelEvent::Closed { reason });
        });

        Ok(Connection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
