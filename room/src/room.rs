use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::RoomResult;
use crate::monitor::ConnectionMonitor;
use crate::selection::Selection;
use crate::store::FactStore;
use crate::transport::local::LocalTransport;
use crate::transport::polling::PollingTransport;
use crate::transport::pushed::PushedTransport;
use crate::transport::{Subscription, Transport};

/// Timing knobs for the remote transports.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Base retry interval: the refresh delay while healthy, and the value
    /// the backoff resets to on success.
    pub base_interval: Duration,
    /// Optional bound on backoff doubling. Unbounded when `None`.
    pub max_interval: Option<Duration>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(1),
            max_interval: None,
        }
    }
}

impl RoomConfig {
    fn monitor(&self) -> Arc<ConnectionMonitor> {
        match self.max_interval {
            Some(cap) => Arc::new(ConnectionMonitor::with_cap(self.base_interval, cap)),
            None => Arc::new(ConnectionMonitor::new(self.base_interval)),
        }
    }
}

/// A view onto a shared pool of facts.
///
/// Construction selects one of three transports; every operation afterwards
/// goes through the same contract, so callers never depend on where the
/// pool lives.
///
/// ```no_run
/// # async fn example() -> room::RoomResult<()> {
/// let room = room::Room::local();
/// room.assert("point at (1, 2)").await?;
///
/// let selection = room.select(&["point at ($x, $y)"]).await?;
/// selection.each(|solution| {
///     println!("x = {:?}", solution.get("x"));
/// });
/// # Ok(())
/// # }
/// ```
pub struct Room {
    transport: Arc<dyn Transport>,
    monitor: Arc<ConnectionMonitor>,
}

impl Room {
    /// Room over an in-process store. Mutations apply synchronously and
    /// redeliver to every live subscription before returning.
    pub fn local() -> Self {
        Self::local_with_store(Arc::new(Mutex::new(FactStore::new())))
    }

    /// Room over an existing in-process store, shared with other Rooms.
    pub fn local_with_store(store: Arc<Mutex<FactStore>>) -> Self {
        // The monitor is inert here: a local room has nothing to lose
        // reachability to.
        let monitor = RoomConfig::default().monitor();
        Self {
            transport: Arc::new(LocalTransport::with_store(store)),
            monitor,
        }
    }

    /// Room over a request/response server; subscriptions poll.
    pub fn polling(base_url: &str) -> Self {
        Self::polling_with(base_url, RoomConfig::default())
    }

    pub fn polling_with(base_url: &str, config: RoomConfig) -> Self {
        let monitor = config.monitor();
        Self {
            transport: Arc::new(PollingTransport::new(base_url, monitor.clone())),
            monitor,
        }
    }

    /// Room over a server with a duplex channel; subscriptions receive
    /// pushed updates.
    pub fn pushed(base_url: &str) -> Self {
        Self::pushed_with(base_url, RoomConfig::default())
    }

    pub fn pushed_with(base_url: &str, config: RoomConfig) -> Self {
        let monitor = config.monitor();
        Self {
            transport: Arc::new(PushedTransport::new(base_url, monitor.clone())),
            monitor,
        }
    }

    pub async fn assert(&self, fact: &str) -> RoomResult<()> {
        self.transport.assert(fact).await
    }

    pub async fn retract(&self, fact: &str) -> RoomResult<()> {
        self.transport.retract(fact).await
    }

    /// Snapshot of all facts currently stored.
    pub async fn facts(&self) -> RoomResult<Vec<String>> {
        self.transport.facts().await
    }

    /// One-shot evaluation. Each query is evaluated independently and the
    /// solutions concatenated.
    pub async fn select(&self, queries: &[&str]) -> RoomResult<Selection> {
        let queries: Vec<String> = queries.iter().map(|q| q.to_string()).collect();
        self.transport.select(&queries).await
    }

    /// Open a live subscription with an empty query list.
    pub async fn subscribe(&self) -> RoomResult<Subscription> {
        self.transport.subscribe().await
    }

    /// Reachability of the transport. Always `true` for a local room;
    /// remote rooms flip this on background refresh failures and recover
    /// it on the next successful cycle.
    pub fn connected(&self) -> bool {
        self.monitor.connected()
    }

    /// Current delay before the next scheduled background refresh.
    pub fn retry_interval(&self) -> Duration {
        self.monitor.retry_interval()
    }
}
