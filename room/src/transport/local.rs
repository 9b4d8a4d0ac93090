//! In-process transport: synchronous store access, synchronous redelivery.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{RoomError, RoomResult};
use crate::registry::SubscriptionRegistry;
use crate::selection::Selection;
use crate::store::FactStore;
use crate::transport::{deliver, Listener, Subscription, SubscriptionBackend, Transport};

/// Direct calls into an in-process [`FactStore`]. After any mutation, every
/// active subscription's query list is re-evaluated against the updated
/// store and redelivered to all of its listeners before the mutating call
/// returns.
pub struct LocalTransport {
    store: Arc<Mutex<FactStore>>,
    registry: Arc<SubscriptionRegistry>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::with_store(Arc::new(Mutex::new(FactStore::new())))
    }

    /// Share one fact pool across several Rooms: any mutation through one
    /// is visible to all subsequent evaluations through the others.
    pub fn with_store(store: Arc<Mutex<FactStore>>) -> Self {
        Self {
            store,
            registry: Arc::new(SubscriptionRegistry::new()),
        }
    }

    fn evaluate(&self, queries: &[String]) -> RoomResult<Selection> {
        let store = self
            .store
            .lock()
            .map_err(|_| RoomError::Internal("fact store lock poisoned".to_string()))?;
        Ok(Selection::new(store.select(queries)))
    }

    /// Redeliver to every live subscription. Snapshots are taken first and
    /// locks dropped before listeners run, so a listener may itself
    /// assert or retract.
    fn redeliver_all(&self) -> RoomResult<()> {
        for (queries, listeners) in self.registry.snapshot_all() {
            if listeners.is_empty() {
                continue;
            }
            let selection = self.evaluate(&queries)?;
            deliver(&listeners, &selection);
        }
        Ok(())
    }

    fn redeliver_one(&self, id: u64) -> RoomResult<()> {
        let (queries, listeners) = self.registry.snapshot_one(id)?;
        let selection = self.evaluate(&queries)?;
        deliver(&listeners, &selection);
        Ok(())
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn assert(&self, fact: &str) -> RoomResult<()> {
        {
            let mut store = self
                .store
                .lock()
                .map_err(|_| RoomError::Internal("fact store lock poisoned".to_string()))?;
            store.assert(fact);
        }
        self.redeliver_all()
    }

    async fn retract(&self, fact: &str) -> RoomResult<()> {
        {
            let mut store = self
                .store
                .lock()
                .map_err(|_| RoomError::Internal("fact store lock poisoned".to_string()))?;
            store.retract(fact);
        }
        self.redeliver_all()
    }

    async fn facts(&self) -> RoomResult<Vec<String>> {
        let store = self
            .store
            .lock()
            .map_err(|_| RoomError::Internal("fact store lock poisoned".to_string()))?;
        Ok(store.facts())
    }

    async fn select(&self, queries: &[String]) -> RoomResult<Selection> {
        self.evaluate(queries)
    }

    async fn subscribe(&self) -> RoomResult<Subscription> {
        let id = self.registry.create();
        Ok(Subscription::new(Arc::new(LocalSubscription {
            id,
            transport: LocalTransport {
                store: self.store.clone(),
                registry: self.registry.clone(),
            },
        })))
    }
}

struct LocalSubscription {
    id: u64,
    transport: LocalTransport,
}

#[async_trait]
impl SubscriptionBackend for LocalSubscription {
    async fn select(&self, queries: Vec<String>) -> RoomResult<()> {
        self.transport.registry.set_queries(self.id, queries)?;
        // Only this subscription's listeners see the change.
        self.transport.redeliver_one(self.id)
    }

    fn add_listener(&self, listener: Listener) -> RoomResult<()> {
        self.transport
            .registry
            .add_listener(self.id, listener.clone())?;
        let (queries, _) = self.transport.registry.snapshot_one(self.id)?;
        let selection = self.transport.evaluate(&queries)?;
        listener(&selection);
        Ok(())
    }

    async fn unsubscribe(&self) {
        self.transport.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn recorder() -> (Arc<Mutex<Vec<usize>>>, impl Fn(&Selection) + Send + Sync) {
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |selection: &Selection| {
            sink.lock().unwrap().push(selection.len());
        })
    }

    #[tokio::test]
    async fn mutation_delivers_cumulative_current_state() {
        let transport = LocalTransport::new();
        let sub = transport.subscribe().await.unwrap();
        sub.select(&["shape $t with color $c"]).await.unwrap();

        let (seen, listener) = recorder();
        sub.add_listener(listener).unwrap();

        transport.assert("shape line with color green").await.unwrap();
        transport.assert("shape circle with color red").await.unwrap();

        // One initial delivery on add_listener, then exactly one per assert;
        // the second assert sees both facts, not a delta of one.
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn add_listener_is_brought_up_to_date_immediately() {
        let transport = LocalTransport::new();
        transport.assert("point at (1, 2)").await.unwrap();

        let sub = transport.subscribe().await.unwrap();
        sub.select(&["point at ($x, $y)"]).await.unwrap();

        let (seen, listener) = recorder();
        sub.add_listener(listener).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn select_redelivers_only_that_subscription() {
        let transport = LocalTransport::new();
        transport.assert("point at (1, 2)").await.unwrap();

        let sub_a = transport.subscribe().await.unwrap();
        let sub_b = transport.subscribe().await.unwrap();

        let (seen_a, listener_a) = recorder();
        let (seen_b, listener_b) = recorder();
        sub_a.add_listener(listener_a).unwrap();
        sub_b.add_listener(listener_b).unwrap();

        sub_a.select(&["point at ($x, $y)"]).await.unwrap();

        assert_eq!(*seen_a.lock().unwrap(), vec![0, 1]);
        // B only saw its initial empty delivery.
        assert_eq!(*seen_b.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_stops_delivery() {
        let transport = LocalTransport::new();
        let sub = transport.subscribe().await.unwrap();
        sub.select(&["point at ($x, $y)"]).await.unwrap();

        let (seen, listener) = recorder();
        sub.add_listener(listener).unwrap();

        sub.unsubscribe().await;
        sub.unsubscribe().await;

        transport.assert("point at (1, 2)").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0]);

        let err = sub.select(&["point at ($x, $y)"]).await.unwrap_err();
        assert!(matches!(err, RoomError::SubscriptionClosed));
    }

    #[tokio::test]
    async fn one_shot_round_trip_binds_variables() {
        let transport = LocalTransport::new();
        transport.assert("point at (1, 2)").await.unwrap();

        let queries = vec!["point at ($x, $y)".to_string()];
        let selection = transport.select(&queries).await.unwrap();
        assert_eq!(selection.len(), 1);
        assert_eq!(
            selection.solutions()[0].get("x"),
            Some(&Term::number(1.0))
        );
        assert_eq!(
            selection.solutions()[0].get("y"),
            Some(&Term::number(2.0))
        );

        transport.retract("point at (1, 2)").await.unwrap();
        let selection = transport.select(&queries).await.unwrap();
        assert!(selection.is_empty());
    }

    #[tokio::test]
    async fn shared_store_is_visible_across_transports() {
        let store = Arc::new(Mutex::new(FactStore::new()));
        let a = LocalTransport::with_store(store.clone());
        let b = LocalTransport::with_store(store);

        a.assert("point at (1, 2)").await.unwrap();
        let facts = b.facts().await.unwrap();
        assert_eq!(facts, vec!["point at (1, 2)".to_string()]);
    }
}
