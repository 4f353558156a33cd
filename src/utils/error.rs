//! The `error` module defines the error type used throughout `popsub-client`.
//!
//! Only caller-invoked operations return these errors. Failures that happen in
//! the background (transport loss, heartbeat timeouts, panicking listeners)
//! are recovered or reported through status and max-retries listeners.

use thiserror::Error;

/// Errors returned by the realtime client.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// The transport could not be opened.
    #[error("failed to open transport: {0}")]
    TransportOpen(String),

    /// An established transport failed while reading or writing.
    #[error("transport lost: {0}")]
    TransportLost(String),

    /// The client has never been connected.
    #[error("not connected")]
    NotConnected,

    /// The client was disconnected explicitly or gave up reconnecting.
    #[error("client is disconnected")]
    Closed,

    /// The configured server URL cannot be turned into a realtime URL.
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    /// An outbound message is not a JSON object with a string `type` field,
    /// or an inbound frame is not a JSON object.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The credential accessor produced nothing to authenticate with.
    #[error("no credential available")]
    MissingCredential,

    /// The outbound queue reached its configured bound.
    #[error("outbound queue is full ({0} pending messages)")]
    QueueFull(usize),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result type for realtime client operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;
