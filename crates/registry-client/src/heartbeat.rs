//! Lease heartbeat
//!
//! A heartbeat renews one node's lease every `touch_interval` until the
//! caller stops it. Touch failures are handed to a caller-supplied handler
//! and the loop carries on: the registry may recover, or the node may be
//! re-added, before the lease actually lapses.
//!
//! Ticks sit on a fixed grid (`start + k * touch_interval`). A touch that
//! overruns its slot makes the loop skip the missed ticks rather than
//! firing them back to back, so at most one touch per node is ever in
//! flight.
//!
//! The heartbeat is a plain future. Spawn it on whatever runtime the
//! application uses:
//!
//! ```no_run
//! use registry_client::{Client, ClientConfig, Node};
//!
//! # async fn example() -> registry_client::Result<()> {
//! let client = Client::new(ClientConfig::new("http://127.0.0.1:20080", "123456"))?;
//! let key = client.add_node("demo", &Node::new("10.0.0.1", 8080)).await?;
//!
//! let (handle, heartbeat) = client.auto_touch_node("demo", key, |err| {
//!     eprintln!("lease renewal failed ({}): {}", err.status(), err);
//! })?;
//! let task = tokio::spawn(heartbeat);
//!
//! // ... serve traffic ...
//!
//! handle.stop();
//! task.await.ok();
//! client.remove_node("demo", &key).await?;
//! # Ok(())
//! # }
//! ```

use crate::client::Client;
use crate::error::Error;
use crate::models::NodeKey;
use async_io::Timer;
use futures::future::{self, BoxFuture, Either};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of a heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    /// Created, future not yet polled
    Idle,
    /// Loop running
    Active,
    /// Loop exited; no further touches
    Stopped,
}

impl HeartbeatState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => HeartbeatState::Idle,
            1 => HeartbeatState::Active,
            _ => HeartbeatState::Stopped,
        }
    }
}

/// Touch counters of a heartbeat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatStats {
    /// Touches started
    pub attempts: u64,
    /// Touches that failed
    pub failures: u64,
}

#[derive(Default)]
struct Shared {
    state: AtomicU8,
    attempts: AtomicU64,
    failures: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: HeartbeatState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Marks the heartbeat stopped however its future ends, including being
/// dropped by an aborted task.
struct StoppedOnDrop(Arc<Shared>);

impl Drop for StoppedOnDrop {
    fn drop(&mut self) {
        self.0.set_state(HeartbeatState::Stopped);
    }
}

/// Control handle for a running heartbeat.
///
/// Clones control the same heartbeat. Dropping every clone stops it.
#[derive(Clone)]
pub struct HeartbeatHandle {
    stop: async_channel::Sender<()>,
    shared: Arc<Shared>,
    service_id: Arc<str>,
    key: NodeKey,
}

impl std::fmt::Debug for HeartbeatHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatHandle")
            .field("service_id", &self.service_id)
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}

impl HeartbeatHandle {
    /// Ask the heartbeat to stop.
    ///
    /// Honoured at the next sleep boundary; a touch already in flight is
    /// allowed to finish.
    pub fn stop(&self) {
        self.stop.close();
    }

    /// Current lifecycle state
    pub fn state(&self) -> HeartbeatState {
        HeartbeatState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    /// Touch counters so far
    pub fn stats(&self) -> HeartbeatStats {
        HeartbeatStats {
            attempts: self.shared.attempts.load(Ordering::SeqCst),
            failures: self.shared.failures.load(Ordering::SeqCst),
        }
    }

    /// Service the node is registered under
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Lease key being renewed
    pub fn key(&self) -> NodeKey {
        self.key
    }
}

/// Build the heartbeat for one node. Inputs are already validated.
pub(crate) fn start<F>(
    client: Client,
    service_id: String,
    key: NodeKey,
    mut on_error: F,
) -> (HeartbeatHandle, BoxFuture<'static, ()>)
where
    F: FnMut(&Error) + Send + 'static,
{
    let (stop_tx, stop_rx) = async_channel::bounded::<()>(1);
    let shared = Arc::new(Shared::default());
    let service_id: Arc<str> = Arc::from(service_id);

    let handle = HeartbeatHandle {
        stop: stop_tx,
        shared: shared.clone(),
        service_id: service_id.clone(),
        key,
    };

    let heartbeat = async move {
        let _stopped = StoppedOnDrop(shared.clone());
        shared.set_state(HeartbeatState::Active);

        let interval = client.config().touch_interval;
        info!(
            "Heartbeat started for node {} in service {} every {:?}",
            key, service_id, interval
        );

        let mut next_tick = Instant::now().checked_add(interval);
        loop {
            // Past the clock's range there is nothing left to schedule
            let timer = match next_tick {
                Some(at) => Timer::at(at),
                None => Timer::never(),
            };
            let stop = stop_rx.recv();
            futures::pin_mut!(stop);
            if let Either::Right(_) = future::select(timer, stop).await {
                break;
            }

            shared.attempts.fetch_add(1, Ordering::SeqCst);
            match client.touch_node(&service_id, &key).await {
                Ok(()) => debug!("Touched node {} in service {}", key, service_id),
                Err(e) => {
                    shared.failures.fetch_add(1, Ordering::SeqCst);
                    warn!(
                        "Failed to touch node {} in service {} ({}): {}",
                        key,
                        service_id,
                        e.status(),
                        e
                    );
                    on_error(&e);
                }
            }

            if let Some(last) = next_tick {
                let (next, skipped) = next_slot(last, interval, Instant::now());
                if skipped > 0 {
                    debug!(
                        "Touch of node {} overran its slot, skipped {} tick(s)",
                        key, skipped
                    );
                }
                next_tick = next;
            }
        }

        info!("Heartbeat stopped for node {} in service {}", key, service_id);
    };

    (handle, Box::pin(heartbeat))
}

/// First grid point after `now` on the grid `last + k * interval`, and how
/// many grid points were passed over to reach it. `None` once the grid
/// leaves the range of `Instant`.
fn next_slot(last: Instant, interval: Duration, now: Instant) -> (Option<Instant>, u128) {
    let Some(candidate) = last.checked_add(interval) else {
        return (None, 0);
    };
    if candidate > now {
        return (Some(candidate), 0);
    }
    let missed = (now - candidate).as_nanos() / interval.as_nanos() + 1;
    let next = interval
        .as_nanos()
        .checked_mul(missed)
        .and_then(|offset| u64::try_from(offset).ok())
        .and_then(|offset| candidate.checked_add(Duration::from_nanos(offset)));
    (next, missed)
}
