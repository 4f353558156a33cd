//! # popsub-client
//!
//! `popsub-client` is an async client for PopSub-style realtime pub/sub
//! servers. It keeps one WebSocket connection per client, multiplexes topic
//! subscriptions over it, buffers outbound messages while the connection is
//! down and reconnects with exponential backoff.
//!
//! ## Core Modules
//!
//! - `client`: The connection lifecycle, subscription registry, outbound queue,
//!   heartbeat monitor and inbound dispatcher.
//! - `config`: Loads client settings from files and environment variables.
//! - `transport`: Wire messages, realtime URL construction and the WebSocket
//!   connector.
//! - `utils`: Shared error type and logging setup.

pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

pub use client::{ConnectionStatus, Credential, RealtimeClient, Subscription};
pub use config::{Settings, load_config};
pub use utils::{RealtimeError, Result};
