use std::collections::VecDeque;

use crate::transport::OutboundFrame;
use crate::utils::{RealtimeError, Result};

/// FIFO buffer of messages accepted while the connection is down.
///
/// Messages are never evicted: a bounded queue rejects new pushes instead.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    frames: VecDeque<OutboundFrame>,
    limit: Option<usize>,
}

impl OutboundQueue {
    /// `limit == 0` means unbounded.
    pub fn new(limit: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            limit: (limit > 0).then_some(limit),
        }
    }

    pub fn push(&mut self, frame: OutboundFrame) -> Result<()> {
        if let Some(limit) = self.limit {
            if self.frames.len() >= limit {
                return Err(RealtimeError::QueueFull(self.frames.len()));
            }
        }
        self.frames.push_back(frame);
        Ok(())
    }

    /// Removes and yields every queued frame in the order it was pushed.
    pub fn drain(&mut self) -> impl Iterator<Item = OutboundFrame> + '_ {
        self.frames.drain(..)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
