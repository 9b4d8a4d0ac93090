use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{RoomError, RoomResult};
use crate::transport::Listener;

#[derive(Default)]
struct SubRecord {
    queries: Vec<String>,
    listeners: Vec<Listener>,
}

/// Bookkeeping for the live subscriptions of a Local room.
///
/// Keyed by a monotonically allocated id, never by position, so removing
/// one subscription cannot shift the identity of another. Remote-pushed
/// rooms delegate the equivalent bookkeeping to the server and only track
/// delivery client-side.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    subs: Mutex<HashMap<u64, SubRecord>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new subscription with an empty query list and no
    /// listeners.
    pub fn create(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut subs) = self.subs.lock() {
            subs.insert(id, SubRecord::default());
        }
        id
    }

    /// Replace the stored query list. Fails if the subscription was
    /// unsubscribed.
    pub fn set_queries(&self, id: u64, queries: Vec<String>) -> RoomResult<()> {
        let mut subs = self.lock()?;
        let record = subs.get_mut(&id).ok_or(RoomError::SubscriptionClosed)?;
        record.queries = queries;
        Ok(())
    }

    pub fn add_listener(&self, id: u64, listener: Listener) -> RoomResult<()> {
        let mut subs = self.lock()?;
        let record = subs.get_mut(&id).ok_or(RoomError::SubscriptionClosed)?;
        record.listeners.push(listener);
        Ok(())
    }

    /// Remove by identity. Returns whether the subscription was still
    /// registered, so removal is idempotent.
    pub fn remove(&self, id: u64) -> bool {
        self.subs
            .lock()
            .map(|mut subs| subs.remove(&id).is_some())
            .unwrap_or(false)
    }

    /// Query list and listeners of one subscription.
    pub fn snapshot_one(&self, id: u64) -> RoomResult<(Vec<String>, Vec<Listener>)> {
        let subs = self.lock()?;
        let record = subs.get(&id).ok_or(RoomError::SubscriptionClosed)?;
        Ok((record.queries.clone(), record.listeners.clone()))
    }

    /// Query lists and listeners of every live subscription. Cloned out so
    /// the caller can evaluate and deliver without holding the registry
    /// lock (listeners may re-enter the room).
    pub fn snapshot_all(&self) -> Vec<(Vec<String>, Vec<Listener>)> {
        self.subs
            .lock()
            .map(|subs| {
                subs.values()
                    .map(|r| (r.queries.clone(), r.listeners.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> RoomResult<std::sync::MutexGuard<'_, HashMap<u64, SubRecord>>> {
        self.subs
            .lock()
            .map_err(|_| RoomError::Internal("subscription registry lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn ids_are_stable_across_removal() {
        let registry = SubscriptionRegistry::new();
        let a = registry.create();
        let b = registry.create();

        assert!(registry.remove(a));
        // Removing one subscription must not disturb the other.
        registry
            .set_queries(b, vec!["point at ($x, $y)".to_string()])
            .unwrap();
        let (queries, _) = registry.snapshot_one(b).unwrap();
        assert_eq!(queries.len(), 1);
    }

    #[test]
    fn operations_on_removed_subscription_fail_fast() {
        let registry = SubscriptionRegistry::new();
        let id = registry.create();
        assert!(registry.remove(id));
        assert!(!registry.remove(id));

        let err = registry.set_queries(id, Vec::new()).unwrap_err();
        assert!(matches!(err, RoomError::SubscriptionClosed));

        let err = registry
            .add_listener(id, Arc::new(|_sel: &crate::Selection| {}))
            .unwrap_err();
        assert!(matches!(err, RoomError::SubscriptionClosed));
    }
}
