use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, trace, warn};

use super::realtime::Shared;
use super::subscription::deliver;
use crate::transport::{FrameStream, InboundFrame};

/// Reads frames until the transport closes or errors, then reports the loss.
///
/// Runs as its own task for the lifetime of one connection (`epoch`).
pub(crate) async fn run(shared: Arc<Shared>, epoch: u64, mut stream: FrameStream) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(text)) => handle_frame(&shared, epoch, &text),
            Some(Err(e)) => break e.to_string(),
            None => break "closed by peer".to_string(),
        }
    };

    shared.connection_lost(epoch, &reason);
}

pub(crate) fn handle_frame(shared: &Shared, epoch: u64, text: &str) {
    match InboundFrame::decode(text) {
        Ok(InboundFrame::Pong) => {
            trace!(client = %shared.id(), "pong");
            shared.record_liveness(epoch);
        }
        Ok(InboundFrame::Topic { topic, message }) => {
            let listeners = shared.listeners_for(epoch, &topic);
            if listeners.is_empty() {
                trace!(client = %shared.id(), topic = %topic, "no listeners, dropping message");
                return;
            }
            deliver(&topic, &listeners, &message);
        }
        Ok(InboundFrame::Other(value)) => {
            debug!(client = %shared.id(), frame = %value, "unrouted frame");
        }
        Err(e) => {
            warn!(client = %shared.id(), error = %e, "dropping malformed frame");
        }
    }
}
