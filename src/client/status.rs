use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use tracing::error;

use super::realtime::Shared;

/// Lifecycle state of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Never connected.
    Idle,
    /// Opening the transport.
    Connecting,
    /// Transport open; heartbeat and dispatcher running.
    Connected,
    /// Transport lost; waiting out the backoff delay.
    Reconnecting,
    /// Explicitly disconnected, or the retry ceiling was reached.
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        }
    }

    /// Whether outbound messages are buffered rather than rejected.
    pub fn buffers_outbound(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Ordered set of callbacks keyed by registration id.
pub(crate) struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> Listeners<T> {
    pub(crate) fn add(&mut self, callback: Callback<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn snapshot(&self) -> Vec<Callback<T>> {
        self.entries.iter().map(|(_, cb)| cb.clone()).collect()
    }
}

/// Invokes every callback with `value`; a panicking callback is logged and
/// the rest still run.
pub(crate) fn announce<T: Copy + fmt::Debug>(callbacks: &[Callback<T>], value: T) {
    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
            error!(?value, "listener panicked");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenerKind {
    Status,
    MaxRetries,
}

/// Returned by listener registration; call [`ListenerHandle::unregister`] to
/// stop receiving notifications. Dropping the handle keeps the listener.
pub struct ListenerHandle {
    id: u64,
    kind: ListenerKind,
    shared: Weak<Shared>,
}

impl ListenerHandle {
    pub(crate) fn new(id: u64, kind: ListenerKind, shared: Weak<Shared>) -> Self {
        Self { id, kind, shared }
    }

    /// Removes the listener. Returns `false` if it was already gone.
    pub fn unregister(self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.remove_listener(self.kind, self.id),
            None => false,
        }
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
