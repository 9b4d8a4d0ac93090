//! Duplex-channel transport: one-way mutations out, pushed solution sets in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, warn};

use crate::error::{RoomError, RoomResult};
use crate::monitor::ConnectionMonitor;
use crate::protocol::ChannelEvent;
use crate::selection::Selection;
use crate::transport::http::HttpClient;
use crate::transport::{deliver, Listener, Subscription, SubscriptionBackend, Transport};

/// `assert` and `retract` travel as one-way messages over a WebSocket;
/// one-shot `select` and `facts` still use request/response. Each
/// subscription owns a dedicated channel: its query list is sent as
/// `updateSubscription`, and every `subscriptionFacts` push on that channel
/// is forwarded to all registered listeners in server emission order.
///
/// Channels are scoped to the HTTP session: a Room with no captured id yet
/// performs one `/facts` exchange before connecting.
pub struct PushedTransport {
    http: Arc<HttpClient>,
    monitor: Arc<ConnectionMonitor>,
    mutations: tokio::sync::Mutex<Option<mpsc::UnboundedSender<ChannelEvent>>>,
}

impl PushedTransport {
    pub fn new(base_url: &str, monitor: Arc<ConnectionMonitor>) -> Self {
        Self {
            http: Arc::new(HttpClient::new(base_url)),
            monitor,
            mutations: tokio::sync::Mutex::new(None),
        }
    }

    async fn channel_url(&self) -> RoomResult<String> {
        let session = self.http.ensure_session().await?;
        Ok(ws_url(self.http.base_url(), &session))
    }

    /// Lazily opened channel carrying this Room's mutations. Reopened on
    /// the next mutation if the previous one died.
    async fn ensure_mutation_channel(&self) -> RoomResult<mpsc::UnboundedSender<ChannelEvent>> {
        let mut guard = self.mutations.lock().await;
        if let Some(tx) = guard.as_ref() {
            if !tx.is_closed() {
                return Ok(tx.clone());
            }
        }

        let url = self.channel_url().await?;
        let (stream, _) = connect_async(url.as_str()).await?;
        let (tx, mut rx) = mpsc::unbounded_channel::<ChannelEvent>();

        tokio::spawn(async move {
            let (mut write, mut read) = stream.split();
            loop {
                tokio::select! {
                    outgoing = rx.recv() => match outgoing {
                        Some(event) => {
                            let Ok(text) = serde_json::to_string(&event) else {
                                continue;
                            };
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    // This channel carries no live query list; drain pushes
                    // so the socket does not back up.
                    incoming = read.next() => match incoming {
                        Some(Ok(_)) => {}
                        _ => break,
                    },
                }
            }
        });

        *guard = Some(tx.clone());
        Ok(tx)
    }

    async fn send_mutation(&self, event: ChannelEvent) -> RoomResult<()> {
        let tx = self.ensure_mutation_channel().await?;
        tx.send(event).map_err(|_| RoomError::ChannelClosed)
    }
}

fn ws_url(base_url: &str, session: &str) -> String {
    let ws_base = base_url
        .replace("http://", "ws://")
        .replace("https://", "wss://");
    format!("{}/session?id={}", ws_base, session)
}

#[async_trait]
impl Transport for PushedTransport {
    async fn assert(&self, fact: &str) -> RoomResult<()> {
        self.send_mutation(ChannelEvent::Assert {
            facts: vec![fact.to_string()],
        })
        .await
    }

    async fn retract(&self, fact: &str) -> RoomResult<()> {
        self.send_mutation(ChannelEvent::Retract {
            facts: vec![fact.to_string()],
        })
        .await
    }

    async fn facts(&self) -> RoomResult<Vec<String>> {
        self.http.facts().await
    }

    async fn select(&self, queries: &[String]) -> RoomResult<Selection> {
        Ok(Selection::new(self.http.select(queries).await?))
    }

    async fn subscribe(&self) -> RoomResult<Subscription> {
        let url = self.channel_url().await?;
        let (out_tx, out_rx) = mpsc::unbounded_channel::<ChannelEvent>();
        let state = Arc::new(PushState {
            monitor: self.monitor.clone(),
            queries: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            last: Mutex::new(None),
            closed: AtomicBool::new(false),
            out: out_tx,
        });
        let task = tokio::spawn(channel_loop(state.clone(), url, out_rx));
        Ok(Subscription::new(Arc::new(PushedSubscription {
            state,
            task: Mutex::new(Some(task)),
        })))
    }
}

struct PushState {
    monitor: Arc<ConnectionMonitor>,
    queries: Mutex<Vec<String>>,
    listeners: Mutex<Vec<Listener>>,
    /// Most recent pushed selection, so a late listener can be brought up
    /// to date without waiting for the next push.
    last: Mutex<Option<Selection>>,
    closed: AtomicBool,
    out: mpsc::UnboundedSender<ChannelEvent>,
}

impl PushState {
    fn snapshot_queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn push_solutions(&self, selection: Selection) {
        let listeners = self
            .listeners
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default();
        deliver(&listeners, &selection);
        if let Ok(mut last) = self.last.lock() {
            *last = Some(selection);
        }
    }
}

/// Owns the subscription's channel for its whole life: connect, re-arm the
/// server-side query list, forward pushes, and on any disconnect back off
/// per the monitor and reconnect. Aborted wholesale by `unsubscribe`.
async fn channel_loop(
    state: Arc<PushState>,
    url: String,
    mut out_rx: mpsc::UnboundedReceiver<ChannelEvent>,
) {
    loop {
        if state.closed.load(Ordering::SeqCst) {
            return;
        }

        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                state.monitor.record_success();
                debug!(url = %url, "subscription channel connected");
                let (mut write, mut read) = stream.split();

                // Re-arm the server with the current query list; it was
                // lost with the previous connection.
                let queries = state.snapshot_queries();
                if !queries.is_empty() {
                    let update = ChannelEvent::UpdateSubscription { facts: queries };
                    if let Ok(text) = serde_json::to_string(&update) {
                        if write.send(Message::Text(text)).await.is_err() {
                            state.monitor.record_failure();
                            tokio::time::sleep(state.monitor.retry_interval()).await;
                            continue;
                        }
                    }
                }

                loop {
                    tokio::select! {
                        outgoing = out_rx.recv() => match outgoing {
                            Some(event) => {
                                let Ok(text) = serde_json::to_string(&event) else {
                                    continue;
                                };
                                if write.send(Message::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                            None => return,
                        },
                        incoming = read.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ChannelEvent>(&text) {
                                    Ok(ChannelEvent::SubscriptionFacts { solutions }) => {
                                        state.push_solutions(Selection::new(solutions));
                                    }
                                    Ok(_) => {}
                                    Err(e) => {
                                        warn!(error = %e, "undecodable channel message");
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "subscription channel error");
                                break;
                            }
                        },
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "subscription channel connect failed");
            }
        }

        if state.closed.load(Ordering::SeqCst) {
            return;
        }
        state.monitor.record_failure();
        tokio::time::sleep(state.monitor.retry_interval()).await;
    }
}

struct PushedSubscription {
    state: Arc<PushState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PushedSubscription {
    fn check_open(&self) -> RoomResult<()> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(RoomError::SubscriptionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionBackend for PushedSubscription {
    async fn select(&self, queries: Vec<String>) -> RoomResult<()> {
        self.check_open()?;
        {
            let mut stored = self.state.queries.lock().map_err(|_| {
                RoomError::Internal("subscription query lock poisoned".to_string())
            })?;
            *stored = queries.clone();
        }
        self.state
            .out
            .send(ChannelEvent::UpdateSubscription { facts: queries })
            .map_err(|_| RoomError::ChannelClosed)
    }

    fn add_listener(&self, listener: Listener) -> RoomResult<()> {
        self.check_open()?;
        {
            let mut listeners = self.state.listeners.lock().map_err(|_| {
                RoomError::Internal("subscription listener lock poisoned".to_string())
            })?;
            listeners.push(listener.clone());
        }
        // Bring the new listener up to date from the last push, if any.
        let last = self.state.last.lock().ok().and_then(|l| l.clone());
        if let Some(selection) = last {
            listener(&selection);
        }
        Ok(())
    }

    async fn unsubscribe(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.lock().ok().and_then(|mut t| t.take()) {
            // Detach the channel entirely, not just the listener list.
            task.abort();
        }
        if let Ok(mut listeners) = self.state.listeners.lock() {
            listeners.clear();
        }
    }
}
