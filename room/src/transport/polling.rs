//! Request/response transport with simulated subscriptions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{RoomError, RoomResult};
use crate::monitor::ConnectionMonitor;
use crate::selection::Selection;
use crate::transport::http::HttpClient;
use crate::transport::{deliver, Listener, Subscription, SubscriptionBackend, Transport};

/// Every operation is one HTTP exchange. A subscription is simulated by a
/// refresh loop that re-issues the select and redelivers whatever solution
/// set comes back. The loop self-schedules: the next attempt starts only
/// after the previous one settles, delayed by the monitor's current retry
/// interval, so a slow server throttles it instead of stacking requests.
pub struct PollingTransport {
    http: Arc<HttpClient>,
    monitor: Arc<ConnectionMonitor>,
}

impl PollingTransport {
    pub fn new(base_url: &str, monitor: Arc<ConnectionMonitor>) -> Self {
        Self {
            http: Arc::new(HttpClient::new(base_url)),
            monitor,
        }
    }
}

#[async_trait]
impl Transport for PollingTransport {
    async fn assert(&self, fact: &str) -> RoomResult<()> {
        self.http.assert(fact).await
    }

    async fn retract(&self, fact: &str) -> RoomResult<()> {
        self.http.retract(fact).await
    }

    async fn facts(&self) -> RoomResult<Vec<String>> {
        self.http.facts().await
    }

    async fn select(&self, queries: &[String]) -> RoomResult<Selection> {
        Ok(Selection::new(self.http.select(queries).await?))
    }

    async fn subscribe(&self) -> RoomResult<Subscription> {
        let state = Arc::new(PollState {
            http: self.http.clone(),
            monitor: self.monitor.clone(),
            queries: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            wake: Notify::new(),
        });
        let task = tokio::spawn(refresh_loop(state.clone()));
        Ok(Subscription::new(Arc::new(PollingSubscription {
            state,
            task: Mutex::new(Some(task)),
        })))
    }
}

struct PollState {
    http: Arc<HttpClient>,
    monitor: Arc<ConnectionMonitor>,
    queries: Mutex<Vec<String>>,
    listeners: Mutex<Vec<Listener>>,
    closed: AtomicBool,
    wake: Notify,
}

impl PollState {
    fn snapshot_queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn snapshot_listeners(&self) -> Vec<Listener> {
        self.listeners.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

/// Refresh failures never reach listeners: they flip the monitor to
/// disconnected and let the backoff schedule govern the next attempt.
async fn refresh_loop(state: Arc<PollState>) {
    loop {
        if state.closed.load(Ordering::SeqCst) {
            return;
        }

        let queries = state.snapshot_queries();
        if !queries.is_empty() {
            match state.http.select(&queries).await {
                Ok(solutions) => {
                    state.monitor.record_success();
                    let listeners = state.snapshot_listeners();
                    if !listeners.is_empty() {
                        let selection = Selection::new(solutions);
                        deliver(&listeners, &selection);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "subscription refresh failed");
                    state.monitor.record_failure();
                }
            }
        }

        let delay = state.monitor.retry_interval();
        tokio::select! {
            _ = state.wake.notified() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

struct PollingSubscription {
    state: Arc<PollState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingSubscription {
    fn check_open(&self) -> RoomResult<()> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(RoomError::SubscriptionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionBackend for PollingSubscription {
    async fn select(&self, queries: Vec<String>) -> RoomResult<()> {
        self.check_open()?;
        {
            let mut stored = self.state.queries.lock().map_err(|_| {
                RoomError::Internal("subscription query lock poisoned".to_string())
            })?;
            *stored = queries;
        }
        // Re-arm: refresh immediately rather than waiting out the interval.
        self.state.wake.notify_one();
        Ok(())
    }

    fn add_listener(&self, listener: Listener) -> RoomResult<()> {
        self.check_open()?;
        {
            let mut listeners = self.state.listeners.lock().map_err(|_| {
                RoomError::Internal("subscription listener lock poisoned".to_string())
            })?;
            listeners.push(listener);
        }
        self.state.wake.notify_one();
        Ok(())
    }

    async fn unsubscribe(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.lock().ok().and_then(|mut t| t.take()) {
            // Abort rather than signal: nothing scheduled-but-undelivered
            // may reach a listener once unsubscribe returns.
            task.abort();
        }
        if let Ok(mut listeners) = self.state.listeners.lock() {
            listeners.clear();
        }
    }
}
