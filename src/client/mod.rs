//! The `client` module implements the realtime pub/sub client.
//!
//! [`RealtimeClient`] owns the connection lifecycle: it opens the transport,
//! replays subscriptions, flushes messages queued while offline, keeps the
//! connection alive with heartbeats and reconnects with exponential backoff
//! when the transport drops. Topic subscriptions are handed out as
//! [`Subscription`] handles.

pub mod backoff;
pub mod credentials;
mod dispatcher;
mod heartbeat;
pub mod queue;
mod realtime;
pub mod status;
pub mod subscription;

pub use backoff::{Backoff, ReconnectPolicy};
pub use credentials::Credential;
pub use queue::OutboundQueue;
pub use realtime::RealtimeClient;
pub use status::{ConnectionStatus, ListenerHandle};
pub use subscription::{Listener, Subscription};
