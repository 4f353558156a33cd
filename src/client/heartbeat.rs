use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{trace, warn};

use super::realtime::Shared;
use crate::transport::ControlMessage;

/// Pings and watches liveness for one connection.
///
/// Sends `ping` every `interval`. If no `pong` arrives within `timeout` of the
/// last one, the connection is declared lost, which tears the transport down
/// and starts the reconnect path. Exits as soon as `epoch` stops being the
/// live connection.
pub(crate) async fn run(shared: Arc<Shared>, epoch: u64, interval: Duration, timeout: Duration) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let Some(last) = shared.last_liveness_for(epoch) else {
            return;
        };

        tokio::select! {
            _ = ticker.tick() => {
                if !shared.send_control(epoch, &ControlMessage::Ping) {
                    return;
                }
                trace!(client = %shared.id(), "ping");
            }
            _ = stale_after(last.checked_add(timeout)) => {
                // a pong may have landed while we slept
                match shared.last_liveness_for(epoch) {
                    Some(last) if is_stale(last, timeout, Instant::now()) => {
                        warn!(
                            client = %shared.id(),
                            silent_for = ?last.elapsed(),
                            "no pong within liveness window, closing transport"
                        );
                        shared.connection_lost(epoch, "heartbeat timeout");
                        return;
                    }
                    Some(_) => continue,
                    None => return,
                }
            }
        }
    }
}

/// Resolves at `deadline`; never resolves when the deadline is out of range.
async fn stale_after(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

pub(crate) fn is_stale(last: Instant, timeout: Duration, now: Instant) -> bool {
    last.checked_add(timeout).is_some_and(|deadline| deadline <= now)
}
