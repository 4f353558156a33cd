//! Connection lifecycle for the realtime client.
//!
//! One [`RealtimeClient`] owns at most one live transport. All mutable state
//! (status, outbound queue, topic registry, listener sets) sits behind a
//! single mutex. Status transitions additionally hold a reentrant
//! `transitions` lock while their listeners run, so announcements are
//! delivered in transition order and a listener may read the client freely.
//!
//! Each successful connect starts a new *epoch* and three tasks bound to it:
//! a writer draining the outbound channel into the transport sink, the
//! inbound dispatcher and the heartbeat monitor. Whichever of them first sees
//! the transport fail calls [`Shared::connection_lost`]; the epoch check there
//! makes sure only one reconnect sequence starts per connection.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{FutureExt, SinkExt};
use parking_lot::{Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::backoff::{Backoff, ReconnectPolicy};
use super::credentials::Credential;
use super::queue::OutboundQueue;
use super::status::{Callback, ConnectionStatus, ListenerHandle, ListenerKind, Listeners, announce};
use super::subscription::{Listener, Subscription, TopicEntry};
use super::{dispatcher, heartbeat};
use crate::config::Settings;
use crate::transport::endpoint::redacted;
use crate::transport::{
    Connector, ControlMessage, FrameSink, Filter, OutboundFrame, Transport, WsConnector,
    realtime_url,
};
use crate::utils::{RealtimeError, Result};

/// How long `disconnect` lets the writer flush and close the sink.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Realtime pub/sub client.
///
/// Maintains one logical connection to the server, multiplexes topic
/// subscriptions over it and reconnects with exponential backoff when the
/// transport fails. Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct RealtimeClient {
    shared: Arc<Shared>,
}

impl RealtimeClient {
    /// Creates a client that connects over WebSocket.
    pub fn new(settings: Settings, credential: impl Into<Credential>) -> Self {
        Self::with_connector(settings, credential, Arc::new(WsConnector))
    }

    /// Creates a client that opens its transport through `connector`.
    pub fn with_connector(
        settings: Settings,
        credential: impl Into<Credential>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let policy = ReconnectPolicy::from(&settings.reconnect);
        let state = State::new(settings.queue.max_pending);

        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                heartbeat_interval: Duration::from_secs(settings.heartbeat.interval_secs),
                heartbeat_timeout: Duration::from_secs(settings.heartbeat.timeout_secs),
                settings,
                credential: credential.into(),
                connector,
                policy,
                transitions: ReentrantMutex::new(()),
                state: Mutex::new(state),
                connecting: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Identifies this client instance in log events.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    /// Reconnects scheduled since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.state.lock().attempts
    }

    /// When the last liveness response arrived (or the connection opened).
    /// `None` unless connected.
    pub fn last_liveness(&self) -> Option<Instant> {
        let st = self.shared.state.lock();
        match st.status {
            ConnectionStatus::Connected => st.last_liveness,
            _ => None,
        }
    }

    /// Messages accepted while disconnected and not yet written.
    pub fn pending_messages(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Number of topics currently registered.
    pub fn channel_count(&self) -> usize {
        self.shared.state.lock().topics.len()
    }

    /// Opens the connection, replaying subscriptions and flushing queued
    /// messages. No-op when already connected; concurrent calls collapse into
    /// one attempt.
    ///
    /// Settings that fail [`Settings::validate`] are rejected with
    /// [`RealtimeError::Config`] before anything is opened.
    ///
    /// A failed attempt is returned to the caller and does not start the
    /// background reconnect loop.
    pub async fn connect(&self) -> Result<()> {
        let _connecting = self.shared.connecting.lock().await;
        self.shared.open_locked(true).await
    }

    /// Closes the connection and stops every background task.
    ///
    /// Queued messages are discarded. Subscriptions stay registered and are
    /// replayed by a later [`connect`](Self::connect). Once this returns no
    /// listener is invoked until the client connects again.
    pub async fn disconnect(&self) -> Result<()> {
        self.shared.disconnect().await;
        Ok(())
    }

    /// Returns the subscription for `topic`, creating it on first use.
    ///
    /// Repeated calls for the same topic share one registry entry; `filter`
    /// is only used when the entry is created.
    pub fn channel(&self, topic: impl Into<String>, filter: Option<Filter>) -> Subscription {
        let topic = topic.into();
        let filter = {
            let mut st = self.shared.state.lock();
            st.topics
                .entry(topic.clone())
                .or_insert_with(|| TopicEntry::new(filter))
                .filter
                .clone()
        };
        Subscription::new(topic, filter, self.shared.clone())
    }

    /// Sends an application message.
    ///
    /// The message must serialize to a JSON object with a string `type`.
    /// While connected it is handed to the transport immediately; while
    /// connecting or reconnecting it is queued and flushed, in order, on the
    /// next successful connect. Fails fast when the client never connected or
    /// was disconnected.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        let frame = OutboundFrame::application(message)?;
        self.shared.send_frame(frame)
    }

    /// Registers a callback invoked synchronously on every status transition.
    pub fn on_status_change<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        let id = self
            .shared
            .state
            .lock()
            .status_listeners
            .add(Arc::new(listener));
        ListenerHandle::new(id, ListenerKind::Status, Arc::downgrade(&self.shared))
    }

    /// Registers a callback invoked once when reconnecting gives up. It
    /// receives the number of attempts made.
    pub fn on_max_retries_exceeded<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        let id = self
            .shared
            .state
            .lock()
            .max_retry_listeners
            .add(Arc::new(listener));
        ListenerHandle::new(id, ListenerKind::MaxRetries, Arc::downgrade(&self.shared))
    }

    /// Connects, runs `f`, then disconnects on every exit path: success,
    /// error and panic (which is resumed after the disconnect).
    pub async fn with_connection<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(RealtimeClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Err(e) = self.connect().await {
            self.disconnect().await?;
            return Err(e);
        }

        let outcome = AssertUnwindSafe(f(self.clone())).catch_unwind().await;
        self.disconnect().await?;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// State shared by the client handle, subscriptions and background tasks.
pub(crate) struct Shared {
    id: Uuid,
    settings: Settings,
    credential: Credential,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
    transitions: ReentrantMutex<()>,
    state: Mutex<State>,
    connecting: tokio::sync::Mutex<()>,
}

struct State {
    status: ConnectionStatus,
    attempts: u32,
    epoch: u64,
    last_liveness: Option<Instant>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    queue: OutboundQueue,
    topics: HashMap<String, TopicEntry>,
    status_listeners: Listeners<ConnectionStatus>,
    max_retry_listeners: Listeners<u32>,
    tasks: Option<ConnectionTasks>,
    reconnect: Option<JoinHandle<()>>,
}

impl State {
    fn new(max_pending: usize) -> Self {
        Self {
            status: ConnectionStatus::Idle,
            attempts: 0,
            epoch: 0,
            last_liveness: None,
            outbound: None,
            queue: OutboundQueue::new(max_pending),
            topics: HashMap::new(),
            status_listeners: Listeners::default(),
            max_retry_listeners: Listeners::default(),
            tasks: None,
            reconnect: None,
        }
    }

    /// Hands a frame to the live writer. `false` if there is none.
    fn write(&self, frame: &OutboundFrame) -> bool {
        match &self.outbound {
            Some(tx) => tx.send(frame.text().to_owned()).is_ok(),
            None => false,
        }
    }
}

/// Background tasks bound to one connection epoch.
struct ConnectionTasks {
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl ConnectionTasks {
    fn abort(&self) {
        self.heartbeat.abort();
        self.reader.abort();
        self.writer.abort();
    }

    /// Stops reader and heartbeat, then gives the writer a moment to flush
    /// and close the sink. The outbound sender must already be dropped.
    async fn shutdown(self) {
        let Self {
            mut writer,
            reader,
            heartbeat,
        } = self;

        heartbeat.abort();
        reader.abort();
        let _ = heartbeat.await;
        let _ = reader.await;

        if time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
            writer.abort();
            let _ = writer.await;
        }
    }
}

impl Shared {
    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    fn status(&self) -> ConnectionStatus {
        self.state.lock().status
    }

    /// Applies a transition and announces it to every status listener.
    ///
    /// Taking the `transitions` guard proves the caller serializes
    /// transitions; it stays held while listeners run.
    fn set_status(
        &self,
        _order: &ReentrantMutexGuard<'_, ()>,
        mut st: MutexGuard<'_, State>,
        status: ConnectionStatus,
    ) {
        let previous = st.status;
        st.status = status;
        let callbacks: Vec<Callback<ConnectionStatus>> = st.status_listeners.snapshot();
        drop(st);

        if previous != status {
            debug!(client = %self.id, from = %previous, to = %status, "status changed");
            announce(&callbacks, status);
        }
    }

    fn resolve_url(&self) -> Result<url::Url> {
        let credential = self.credential.resolve()?;
        realtime_url(
            &self.settings.server.url,
            &self.settings.server.realtime_path,
            &self.settings.server.credential_param,
            &credential,
        )
    }

    /// Opens a transport and installs it. The caller holds `connecting`.
    ///
    /// `manual` attempts may start from any state; the backoff loop only
    /// proceeds while the client is still reconnecting.
    async fn open_locked(self: &Arc<Self>, manual: bool) -> Result<()> {
        self.settings.validate()?;

        let prior = {
            let order = self.transitions.lock();
            let st = self.state.lock();
            let prior = st.status;
            match prior {
                ConnectionStatus::Connected => return Ok(()),
                ConnectionStatus::Reconnecting => {}
                _ if manual => {}
                _ => return Err(RealtimeError::Closed),
            }
            self.set_status(&order, st, ConnectionStatus::Connecting);
            prior
        };

        let opened = match self.resolve_url() {
            Ok(url) => {
                info!(client = %self.id, url = %redacted(&url), "opening realtime connection");
                self.connector.open(url.as_str()).await
            }
            Err(e) => Err(e),
        };

        match opened {
            Ok(transport) => self.install(transport),
            Err(e) => {
                self.open_failed(prior, &e);
                Err(e)
            }
        }
    }

    fn open_failed(&self, prior: ConnectionStatus, error: &RealtimeError) {
        let order = self.transitions.lock();
        let st = self.state.lock();
        // a concurrent disconnect already decided the outcome
        if st.status != ConnectionStatus::Connecting {
            return;
        }
        let next = match prior {
            ConnectionStatus::Reconnecting => ConnectionStatus::Reconnecting,
            _ => ConnectionStatus::Disconnected,
        };
        warn!(client = %self.id, error = %error, "failed to open realtime connection");
        self.set_status(&order, st, next);
    }

    /// Makes `transport` the live connection.
    ///
    /// Under the state lock: replays every subscribed topic, flushes the
    /// outbound queue, then starts the writer, dispatcher and heartbeat. Any
    /// `send` issued afterwards is ordered behind all of these frames.
    fn install(self: &Arc<Self>, transport: Transport) -> Result<()> {
        let Transport { sink, stream } = transport;

        let order = self.transitions.lock();
        let mut st = self.state.lock();
        if st.status != ConnectionStatus::Connecting {
            debug!(client = %self.id, "connect superseded by disconnect, dropping transport");
            return Err(RealtimeError::Closed);
        }
        if let Some(stale) = st.tasks.take() {
            stale.abort();
        }

        st.epoch += 1;
        let epoch = st.epoch;
        st.attempts = 0;
        st.last_liveness = Some(Instant::now());

        let (tx, rx) = mpsc::unbounded_channel::<String>();

        let mut resubscribed = 0usize;
        for (topic, entry) in st.topics.iter().filter(|(_, entry)| entry.subscribed) {
            let subscribe = ControlMessage::Subscribe {
                topic: topic.clone(),
                filter: entry.filter.clone(),
            };
            match OutboundFrame::control(&subscribe) {
                Ok(frame) => {
                    let _ = tx.send(frame.into_text());
                    resubscribed += 1;
                }
                Err(e) => warn!(client = %self.id, topic = %topic, error = %e, "cannot encode subscribe"),
            }
        }

        let flushed = st.queue.len();
        for frame in st.queue.drain() {
            let _ = tx.send(frame.into_text());
        }
        st.outbound = Some(tx);

        st.tasks = Some(ConnectionTasks {
            writer: tokio::spawn(write_loop(self.clone(), epoch, rx, sink)),
            reader: tokio::spawn(dispatcher::run(self.clone(), epoch, stream)),
            heartbeat: tokio::spawn(heartbeat::run(
                self.clone(),
                epoch,
                self.heartbeat_interval,
                self.heartbeat_timeout,
            )),
        });

        info!(client = %self.id, epoch, resubscribed, flushed, "realtime connection established");
        self.set_status(&order, st, ConnectionStatus::Connected);
        Ok(())
    }

    /// Routes a transport failure into the reconnect path.
    ///
    /// Only the first report for the live epoch counts; later reports from
    /// the sibling tasks of the same connection are ignored.
    pub(crate) fn connection_lost(self: &Arc<Self>, epoch: u64, reason: &str) {
        let order = self.transitions.lock();
        let mut st = self.state.lock();
        if st.epoch != epoch || st.status != ConnectionStatus::Connected {
            return;
        }

        warn!(client = %self.id, epoch, reason, "realtime connection lost");
        st.outbound = None;
        st.last_liveness = None;
        if let Some(tasks) = st.tasks.take() {
            tasks.abort();
        }

        let handle = tokio::spawn(self.clone().reconnect_loop());
        if let Some(previous) = st.reconnect.replace(handle) {
            previous.abort();
        }

        self.set_status(&order, st, ConnectionStatus::Reconnecting);
    }

    async fn reconnect_loop(self: Arc<Self>) {
        loop {
            let delay = {
                let order = self.transitions.lock();
                let mut st = self.state.lock();
                if st.status != ConnectionStatus::Reconnecting {
                    return;
                }

                match self.policy.decide(st.attempts) {
                    Backoff::Retry(delay) => {
                        st.attempts += 1;
                        info!(client = %self.id, attempt = st.attempts, ?delay, "scheduling reconnect");
                        delay
                    }
                    Backoff::GiveUp => {
                        let attempts = st.attempts;
                        let callbacks = st.max_retry_listeners.snapshot();
                        error!(
                            client = %self.id,
                            attempts,
                            max_attempts = self.policy.max_attempts(),
                            "reconnect attempts exhausted, giving up"
                        );
                        self.set_status(&order, st, ConnectionStatus::Disconnected);
                        announce(&callbacks, attempts);
                        return;
                    }
                }
            };

            time::sleep(delay).await;

            let _connecting = self.connecting.lock().await;
            match self.open_locked(false).await {
                Ok(()) => return,
                Err(e) => {
                    if self.status() != ConnectionStatus::Reconnecting {
                        return;
                    }
                    debug!(client = %self.id, error = %e, "reconnect attempt failed");
                }
            }
        }
    }

    async fn disconnect(&self) {
        let (tasks, reconnect) = {
            let order = self.transitions.lock();
            let mut st = self.state.lock();

            let dropped = st.queue.len();
            if dropped > 0 {
                warn!(client = %self.id, dropped, "discarding queued messages on disconnect");
            }
            st.queue.clear();
            st.outbound = None;
            st.last_liveness = None;
            let tasks = st.tasks.take();
            let reconnect = st.reconnect.take();

            self.set_status(&order, st, ConnectionStatus::Disconnected);
            (tasks, reconnect)
        };

        if let Some(handle) = reconnect {
            handle.abort();
            let _ = handle.await;
        }
        if let Some(tasks) = tasks {
            tasks.shutdown().await;
        }
        info!(client = %self.id, "realtime client disconnected");
    }

    fn send_frame(&self, frame: OutboundFrame) -> Result<()> {
        let mut st = self.state.lock();
        let status = st.status;
        match status {
            ConnectionStatus::Connected if st.write(&frame) => {
                debug!(client = %self.id, kind = frame.kind(), "sent");
                Ok(())
            }
            // writer already gone; the loss is being reported
            ConnectionStatus::Connected => st.queue.push(frame),
            _ if status.buffers_outbound() => {
                debug!(client = %self.id, kind = frame.kind(), pending = st.queue.len() + 1, "queued while {status}");
                st.queue.push(frame)
            }
            ConnectionStatus::Idle => Err(RealtimeError::NotConnected),
            _ => Err(RealtimeError::Closed),
        }
    }

    /// Heartbeat check for `epoch`. `false` once that epoch is over.
    pub(crate) fn send_control(&self, epoch: u64, message: &ControlMessage) -> bool {
        let st = self.state.lock();
        if st.epoch != epoch || st.status != ConnectionStatus::Connected {
            return false;
        }
        match OutboundFrame::control(message) {
            Ok(frame) => st.write(&frame),
            Err(_) => false,
        }
    }

    pub(crate) fn record_liveness(&self, epoch: u64) {
        let mut st = self.state.lock();
        if st.epoch == epoch && st.status == ConnectionStatus::Connected {
            st.last_liveness = Some(Instant::now());
        }
    }

    pub(crate) fn last_liveness_for(&self, epoch: u64) -> Option<Instant> {
        let st = self.state.lock();
        if st.epoch != epoch || st.status != ConnectionStatus::Connected {
            return None;
        }
        st.last_liveness
    }

    /// Listeners to call for a frame read on `epoch`; empty for stale epochs
    /// and unknown topics.
    pub(crate) fn listeners_for(&self, epoch: u64, topic: &str) -> Vec<Listener> {
        let st = self.state.lock();
        if st.epoch != epoch || st.status != ConnectionStatus::Connected {
            return Vec::new();
        }
        st.topics
            .get(topic)
            .map(|entry| entry.listeners.clone())
            .unwrap_or_default()
    }

    pub(crate) fn subscribe(&self, topic: &str, filter: &Option<Filter>) -> Result<()> {
        let mut st = self.state.lock();
        let status = st.status;
        if status == ConnectionStatus::Disconnected {
            return Err(RealtimeError::Closed);
        }

        let entry = st
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicEntry::new(filter.clone()));
        if entry.subscribed {
            return Ok(());
        }
        let frame = OutboundFrame::control(&ControlMessage::Subscribe {
            topic: topic.to_string(),
            filter: entry.filter.clone(),
        })?;
        entry.subscribed = true;

        // otherwise the next connect replays it
        if status == ConnectionStatus::Connected && st.write(&frame) {
            debug!(client = %self.id, topic, "subscribed");
        }
        Ok(())
    }

    pub(crate) fn unsubscribe(&self, topic: &str) -> Result<()> {
        let mut st = self.state.lock();
        match st.topics.get(topic) {
            Some(entry) if entry.subscribed => {}
            _ => return Ok(()),
        }
        st.topics.remove(topic);

        // a server that lost the connection holds no subscription to cancel
        if st.status == ConnectionStatus::Connected {
            let frame = OutboundFrame::control(&ControlMessage::Unsubscribe {
                topic: topic.to_string(),
            })?;
            st.write(&frame);
        } else {
            debug!(
                client = %self.id,
                topic,
                status = %st.status,
                "not connected, skipping unsubscribe frame"
            );
        }
        debug!(client = %self.id, topic, "unsubscribed");
        Ok(())
    }

    pub(crate) fn add_listener(&self, topic: &str, filter: &Option<Filter>, listener: Listener) {
        self.state
            .lock()
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicEntry::new(filter.clone()))
            .listeners
            .push(listener);
    }

    pub(crate) fn topic_filter(&self, topic: &str) -> Option<Option<Filter>> {
        self.state
            .lock()
            .topics
            .get(topic)
            .map(|entry| entry.filter.clone())
    }

    pub(crate) fn is_subscribed(&self, topic: &str) -> bool {
        self.state
            .lock()
            .topics
            .get(topic)
            .is_some_and(|entry| entry.subscribed)
    }

    pub(crate) fn listener_count(&self, topic: &str) -> usize {
        self.state
            .lock()
            .topics
            .get(topic)
            .map_or(0, |entry| entry.listeners.len())
    }

    pub(crate) fn remove_listener(&self, kind: ListenerKind, id: u64) -> bool {
        let mut st = self.state.lock();
        match kind {
            ListenerKind::Status => st.status_listeners.remove(id),
            ListenerKind::MaxRetries => st.max_retry_listeners.remove(id),
        }
    }
}

/// Drains the outbound channel into the transport sink for one epoch.
///
/// Ends when the sender is dropped (disconnect: the sink is closed
/// gracefully) or when a write fails (reported as a lost connection).
async fn write_loop(
    shared: Arc<Shared>,
    epoch: u64,
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sink: FrameSink,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = sink.send(frame).await {
            shared.connection_lost(epoch, &e.to_string());
            return;
        }
    }

    if let Err(e) = sink.close().await {
        debug!(client = %shared.id, error = %e, "error closing transport");
    }
}
