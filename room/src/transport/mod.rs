//! Transport capability: one contract, three interchangeable strategies.
//!
//! Local talks to an in-process store synchronously, Polling does one HTTP
//! exchange per operation and simulates subscriptions with a refresh loop,
//! Pushed sends mutations over a duplex channel and receives server-pushed
//! solution sets on it. Construction selects the variant; everything
//! downstream depends only on this contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RoomResult;
use crate::selection::Selection;

pub mod http;
pub mod local;
pub mod polling;
pub mod pushed;

/// Callback receiving the complete, current solution set for a
/// subscription's query list. Always a full snapshot, never a diff.
pub type Listener = Arc<dyn Fn(&Selection) + Send + Sync>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fire-and-forget mutation. Local mode applies it, and redelivers to
    /// every live subscription, before returning.
    async fn assert(&self, fact: &str) -> RoomResult<()>;

    /// Same contract as `assert`.
    async fn retract(&self, fact: &str) -> RoomResult<()>;

    /// Snapshot of all facts currently stored. Diagnostic use.
    async fn facts(&self) -> RoomResult<Vec<String>>;

    /// One-shot evaluation of the query list.
    async fn select(&self, queries: &[String]) -> RoomResult<Selection>;

    /// Open a live subscription with an empty query list.
    async fn subscribe(&self) -> RoomResult<Subscription>;
}

#[async_trait]
pub(crate) trait SubscriptionBackend: Send + Sync {
    async fn select(&self, queries: Vec<String>) -> RoomResult<()>;
    fn add_listener(&self, listener: Listener) -> RoomResult<()>;
    async fn unsubscribe(&self);
}

/// Handle to a live subscription.
///
/// The query list may be replaced any number of times via [`select`];
/// every listener receives the current solution set on each change.
/// [`unsubscribe`] is terminal and idempotent: no delivery occurs after it
/// returns, and any other call on the handle afterwards fails with
/// [`crate::RoomError::SubscriptionClosed`].
///
/// [`select`]: Subscription::select
/// [`unsubscribe`]: Subscription::unsubscribe
pub struct Subscription {
    backend: Arc<dyn SubscriptionBackend>,
}

impl Subscription {
    pub(crate) fn new(backend: Arc<dyn SubscriptionBackend>) -> Self {
        Self { backend }
    }

    /// Replace the live query list and re-arm delivery.
    pub async fn select(&self, queries: &[&str]) -> RoomResult<()> {
        let queries = queries.iter().map(|q| q.to_string()).collect();
        self.backend.select(queries).await
    }

    /// Register a listener. It is immediately brought up to date with the
    /// current state, then re-invoked on every change.
    pub fn add_listener<F>(&self, listener: F) -> RoomResult<()>
    where
        F: Fn(&Selection) + Send + Sync + 'static,
    {
        self.backend.add_listener(Arc::new(listener))
    }

    pub async fn unsubscribe(&self) {
        self.backend.unsubscribe().await;
    }
}

/// Fan a delivery out to a listener snapshot. Callers must not hold any
/// subscription or store lock here: listeners may re-enter the room.
pub(crate) fn deliver(listeners: &[Listener], selection: &Selection) {
    for listener in listeners {
        listener(selection);
    }
}
