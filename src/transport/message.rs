//! Wire messages exchanged with the realtime server.
//!
//! Every frame is a JSON object tagged by a `type` field. The client emits
//! `subscribe`, `unsubscribe` and `ping` control frames plus application
//! messages carrying their own `type`; the server answers pings with `pong`
//! and pushes application messages carrying a `topic`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::{RealtimeError, Result};

/// Opaque subscription criteria, passed to the server unmodified.
pub type Filter = Map<String, Value>;

/// Control frames the client sends on its own behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Subscribe {
        topic: String,
        filter: Option<Filter>,
    },
    Unsubscribe {
        topic: String,
    },
    Ping,
}

/// A serialized frame waiting to be written, tagged with its message kind.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    kind: String,
    text: String,
}

impl OutboundFrame {
    /// Serializes an application message.
    ///
    /// The message must serialize to a JSON object whose `type` is a string.
    pub fn application<T: Serialize + ?Sized>(message: &T) -> Result<Self> {
        let value = serde_json::to_value(message)?;
        let kind = match value.as_object().and_then(|obj| obj.get("type")) {
            Some(Value::String(kind)) if !kind.is_empty() => kind.clone(),
            Some(_) => {
                return Err(RealtimeError::InvalidMessage(
                    "`type` must be a non-empty string".to_string(),
                ));
            }
            None if value.is_object() => {
                return Err(RealtimeError::InvalidMessage(
                    "missing `type` field".to_string(),
                ));
            }
            None => {
                return Err(RealtimeError::InvalidMessage(format!(
                    "expected a JSON object, got {value}"
                )));
            }
        };

        Ok(Self {
            kind,
            text: value.to_string(),
        })
    }

    pub fn control(message: &ControlMessage) -> Result<Self> {
        let kind = match message {
            ControlMessage::Subscribe { .. } => "subscribe",
            ControlMessage::Unsubscribe { .. } => "unsubscribe",
            ControlMessage::Ping => "ping",
        };
        Ok(Self {
            kind: kind.to_string(),
            text: serde_json::to_string(message)?,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Liveness response to our `ping`.
    Pong,
    /// Application message addressed to a topic.
    Topic { topic: String, message: Value },
    /// Anything else the server sends (acks, errors).
    Other(Value),
}

impl InboundFrame {
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(RealtimeError::InvalidMessage(format!(
                "expected a JSON object, got {value}"
            )));
        }

        if value.get("type").and_then(Value::as_str) == Some("pong") {
            return Ok(Self::Pong);
        }

        match value.get("topic").and_then(Value::as_str) {
            Some(topic) => Ok(Self::Topic {
                topic: topic.to_string(),
                message: value,
            }),
            None => Ok(Self::Other(value)),
        }
    }
}
