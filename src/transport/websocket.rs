//! WebSocket transport
//!
//! The client core talks to the network only through [`Connector`], which
//! opens a [`Transport`]: a sink of outbound text frames and a stream of
//! inbound ones. [`WsConnector`] is the production implementation on top of
//! `tokio-tungstenite`; tests substitute an in-memory connector.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::connect_async;
use tracing::debug;
use tungstenite::protocol::Message as WsMessage;

use crate::utils::{RealtimeError, Result};

/// Outbound half of an open transport.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = RealtimeError> + Send>>;

/// Inbound half of an open transport. The stream ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A bidirectional message transport owned by one client connection.
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Transport {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

/// Connection factory used by the client to (re)open its transport.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Transport>;
}

/// Opens WebSocket connections with `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Transport> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| RealtimeError::TransportOpen(e.to_string()))?;
        debug!(status = %response.status(), "websocket handshake complete");

        let (ws_sender, ws_receiver) = ws_stream.split();

        let sink = ws_sender
            .sink_map_err(|e| RealtimeError::TransportLost(e.to_string()))
            .with(|frame: String| future::ready(Ok::<_, RealtimeError>(WsMessage::text(frame))));

        let stream = ws_receiver.filter_map(|msg| future::ready(text_frame(msg)));

        Ok(Transport::new(Box::pin(sink), Box::pin(stream)))
    }
}

/// Keeps text (and UTF-8 binary) frames; ping/pong/close are handled by
/// tungstenite itself.
fn text_frame(msg: std::result::Result<WsMessage, tungstenite::Error>) -> Option<Result<String>> {
    match msg {
        Ok(WsMessage::Text(text)) => Some(Ok(text.as_str().to_owned())),
        Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(Ok(text)),
            Err(_) => {
                debug!(len = bytes.len(), "dropping non-UTF-8 binary frame");
                None
            }
        },
        Ok(_) => None,
        Err(e) => Some(Err(RealtimeError::TransportLost(e.to_string()))),
    }
}
