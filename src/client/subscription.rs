use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value;
use tracing::error;

use super::realtime::Shared;
use crate::transport::Filter;
use crate::utils::Result;

/// Callback invoked with every inbound message routed to a topic.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registry entry for one topic. The registry owns exactly one per topic.
pub(crate) struct TopicEntry {
    pub(crate) filter: Option<Filter>,
    pub(crate) listeners: Vec<Listener>,
    /// Caller intent: replayed on every (re)connect while set.
    pub(crate) subscribed: bool,
}

impl TopicEntry {
    pub(crate) fn new(filter: Option<Filter>) -> Self {
        Self {
            filter,
            listeners: Vec::new(),
            subscribed: false,
        }
    }
}

/// Handle to the topic-scoped subscription owned by a client.
///
/// Handles are cheap to clone and every handle for the same topic refers to
/// the same registry entry, so listeners and the subscribed flag are shared.
#[derive(Clone)]
pub struct Subscription {
    topic: String,
    filter: Option<Filter>,
    shared: Arc<Shared>,
}

impl Subscription {
    pub(crate) fn new(topic: String, filter: Option<Filter>, shared: Arc<Shared>) -> Self {
        Self {
            topic,
            filter,
            shared,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Filter sent with the `subscribe` frame.
    pub fn filter(&self) -> Option<Filter> {
        self.shared
            .topic_filter(&self.topic)
            .unwrap_or_else(|| self.filter.clone())
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.is_subscribed(&self.topic)
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listener_count(&self.topic)
    }

    /// Registers a listener. Does not change the subscription state.
    pub fn on<F>(&self, listener: F) -> &Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.shared
            .add_listener(&self.topic, &self.filter, Arc::new(listener));
        self
    }

    /// Asks the server for messages on this topic.
    ///
    /// Idempotent: an already subscribed topic sends nothing. While the
    /// connection is down the intent is recorded and the `subscribe` frame is
    /// sent as part of the next connect.
    pub fn subscribe(&self) -> Result<&Self> {
        self.shared.subscribe(&self.topic, &self.filter)?;
        Ok(self)
    }

    /// Stops the subscription, drops every listener and removes the topic
    /// from the client. No-op if not subscribed.
    pub fn unsubscribe(&self) -> Result<()> {
        self.shared.unsubscribe(&self.topic)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("filter", &self.filter)
            .finish()
    }
}

/// Hands `message` to each listener behind its own unwind boundary.
///
/// Returns how many listeners panicked.
pub(crate) fn deliver(topic: &str, listeners: &[Listener], message: &Value) -> usize {
    let mut failed = 0;
    for listener in listeners {
        if catch_unwind(AssertUnwindSafe(|| listener(message))).is_err() {
            failed += 1;
            error!(topic, "subscription listener panicked");
        }
    }
    failed
}
