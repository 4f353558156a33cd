//! The `transport` module is responsible for network communication with the
//! realtime server.
//!
//! It defines the wire protocol (control frames, application frames and
//! inbound decoding), derives the WebSocket URL from the API base, and
//! provides the connection factory used by the client.

pub mod endpoint;
pub mod message;
pub mod websocket;

pub use endpoint::realtime_url;
pub use message::{ControlMessage, Filter, InboundFrame, OutboundFrame};
pub use websocket::{Connector, FrameSink, FrameStream, Transport, WsConnector};

#[cfg(test)]
mod tests;
