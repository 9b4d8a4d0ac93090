//! HTTP endpoints and the duplex session channel over one shared fact pool
//! per session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use room::protocol::{
    AckResponse, ChannelEvent, FactRequest, FactsRequest, FactsResponse, SelectRequest,
    SelectResponse,
};
use room::term::Solution;
use room::FactStore;

/// One session's fact pool. Mutations signal the broadcast channel so every
/// session channel re-evaluates its query list.
pub struct SessionRoom {
    store: Mutex<FactStore>,
    changed: broadcast::Sender<()>,
}

impl SessionRoom {
    fn new() -> Arc<Self> {
        let (changed, _) = broadcast::channel(64);
        Arc::new(Self {
            store: Mutex::new(FactStore::new()),
            changed,
        })
    }

    fn assert(&self, fact: &str) -> Result<(), StatusCode> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        store.assert(fact);
        drop(store);
        let _ = self.changed.send(());
        Ok(())
    }

    fn retract(&self, pattern: &str) -> Result<(), StatusCode> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        store.retract(pattern);
        drop(store);
        let _ = self.changed.send(());
        Ok(())
    }

    fn facts(&self) -> Result<Vec<String>, StatusCode> {
        self.store
            .lock()
            .map(|store| store.facts())
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn select(&self, queries: &[String]) -> Result<Vec<Solution>, StatusCode> {
        self.store
            .lock()
            .map(|store| store.select(queries))
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Session-id to fact-pool map. A request with a null id gets a fresh
/// session; an unknown id gets a session created under that id, so clients
/// that outlive a server restart keep working against an empty pool.
#[derive(Default)]
pub struct GatewayState {
    sessions: Mutex<HashMap<String, Arc<SessionRoom>>>,
}

impl GatewayState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn resolve(&self, id: Option<String>) -> Result<(String, Arc<SessionRoom>), StatusCode> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        let room = sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session = %id, "created session");
                SessionRoom::new()
            })
            .clone();
        Ok((id, room))
    }
}

pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/facts", post(facts_handler))
        .route("/assert", post(assert_handler))
        .route("/retract", post(retract_handler))
        .route("/select", post(select_handler))
        .route("/session", get(session_handler))
        .with_state(state)
}

async fn facts_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<FactsRequest>,
) -> Result<Json<FactsResponse>, StatusCode> {
    let (id, room) = state.resolve(request.id)?;
    let facts = room.facts()?;
    Ok(Json(FactsResponse {
        id: Some(id),
        facts,
    }))
}

async fn assert_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<FactRequest>,
) -> Result<Json<AckResponse>, StatusCode> {
    let (id, room) = state.resolve(request.id)?;
    room.assert(&request.fact)?;
    Ok(Json(AckResponse { id: Some(id) }))
}

async fn retract_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<FactRequest>,
) -> Result<Json<AckResponse>, StatusCode> {
    let (id, room) = state.resolve(request.id)?;
    room.retract(&request.fact)?;
    Ok(Json(AckResponse { id: Some(id) }))
}

async fn select_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<SelectResponse>, StatusCode> {
    let (id, room) = state.resolve(request.id)?;
    let solutions = room.select(&request.facts)?;
    Ok(Json(SelectResponse {
        id: Some(id),
        solutions,
    }))
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    id: Option<String>,
}

async fn session_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<SessionQuery>,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    match state.resolve(params.id) {
        Ok((id, room)) => ws
            .on_upgrade(move |socket| session_channel(socket, id, room))
            .into_response(),
        Err(status) => status.into_response(),
    }
}

/// One connection, one subscription. The client sends `updateSubscription`
/// to replace this channel's query list and may send `assert` / `retract`
/// as one-way mutations; the server pushes `subscriptionFacts` whenever the
/// result set for the current query list changes.
async fn session_channel(socket: WebSocket, session: String, room: Arc<SessionRoom>) {
    let (mut sender, mut receiver) = socket.split();
    let mut changed = room.changed.subscribe();
    let mut queries: Vec<String> = Vec::new();
    let mut last_sent: Option<Vec<Solution>> = None;

    debug!(session = %session, "session channel open");

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ChannelEvent>(&text) {
                        Ok(ChannelEvent::Assert { facts }) => {
                            if let Ok(mut store) = room.store.lock() {
                                for fact in &facts {
                                    store.assert(fact);
                                }
                            }
                            let _ = room.changed.send(());
                        }
                        Ok(ChannelEvent::Retract { facts }) => {
                            if let Ok(mut store) = room.store.lock() {
                                for pattern in &facts {
                                    store.retract(pattern);
                                }
                            }
                            let _ = room.changed.send(());
                        }
                        Ok(ChannelEvent::UpdateSubscription { facts }) => {
                            queries = facts;
                            // New query list: always push, even if the
                            // solutions happen to match the previous set.
                            last_sent = None;
                            if push_solutions(&mut sender, &room, &queries, &mut last_sent)
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Ok(ChannelEvent::SubscriptionFacts { .. }) => {
                            warn!(session = %session, "client sent a server-only event");
                        }
                        Err(e) => {
                            warn!(session = %session, error = %e, "undecodable channel message");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(session = %session, error = %e, "session channel error");
                    break;
                }
            },
            notified = changed.recv() => {
                if let Err(broadcast::error::RecvError::Closed) = notified {
                    break;
                }
                // Lagged is fine: we re-evaluate against current state anyway.
                if push_solutions(&mut sender, &room, &queries, &mut last_sent)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    debug!(session = %session, "session channel closed");
}

/// Push the current solution set if it differs from the last one sent.
async fn push_solutions<S>(
    sender: &mut S,
    room: &SessionRoom,
    queries: &[String],
    last_sent: &mut Option<Vec<Solution>>,
) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let solutions = match room.select(queries) {
        Ok(solutions) => solutions,
        Err(_) => return Err(()),
    };
    if last_sent.as_ref() == Some(&solutions) {
        return Ok(());
    }

    let event = ChannelEvent::SubscriptionFacts {
        solutions: solutions.clone(),
    };
    let text = serde_json::to_string(&event).map_err(|_| ())?;
    sender.send(Message::Text(text)).await.map_err(|_| ())?;
    *last_sent = Some(solutions);
    Ok(())
}
