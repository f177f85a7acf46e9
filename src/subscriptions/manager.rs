//! Subscription manager for broadcasting store changes.

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<StoreEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if the buffer is full or the
    /// receiver is gone (subscriber will be dropped).
    fn try_send(&self, event: StoreEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

/// Manages subscriptions and broadcasts events.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription. Only changes made after this call are
    /// delivered.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.subscriptions
            .write()
            .insert(id, Subscription { config, sender });

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(sub) = self.subscriptions.write().remove(&id) {
            let _ = sub.sender.try_send(StoreEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Broadcast a change to matching subscriptions. Drops subscribers that
    /// fail to receive.
    pub fn broadcast(&self, event: &StoreEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if sub.config.filter.matches(event) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    tracing::debug!(subscription = id.0, "dropping slow subscriber");
                    let _ = sub.sender.try_send(StoreEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::SubscriptionFilter;
    use crate::types::{Collection, Record, RecordId, Timestamp};
    use serde_json::json;
    use std::time::Duration;

    fn make_record(collection: Collection, owner: &str) -> Record {
        let fields = match json!({ "owner": owner }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        Record {
            id: RecordId(1),
            collection,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
            fields,
        }
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let manager = SubscriptionManager::new();

        let handle = manager.subscribe(SubscriptionConfig::default());
        assert_eq!(manager.subscription_count(), 1);

        manager.unsubscribe(handle.id);
        assert_eq!(manager.subscription_count(), 0);

        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(matches!(
            event,
            StoreEvent::Dropped {
                reason: DropReason::Unsubscribed
            }
        ));
    }

    #[test]
    fn test_collection_filter() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::collection(Collection::Habits),
            ..Default::default()
        });

        manager.broadcast(&StoreEvent::Inserted {
            record: make_record(Collection::HabitCompletions, "u1"),
        });
        assert!(handle.try_recv().is_err());

        manager.broadcast(&StoreEvent::Inserted {
            record: make_record(Collection::Habits, "u1"),
        });
        match handle.recv_timeout(Duration::from_millis(100)).unwrap() {
            StoreEvent::Inserted { record } => assert_eq!(record.collection, Collection::Habits),
            other => panic!("Expected Inserted event, got {:?}", other),
        }
    }

    #[test]
    fn test_owner_filter() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::all().owned_by("u1"),
            ..Default::default()
        });

        manager.broadcast(&StoreEvent::Deleted {
            collection: Collection::Habits,
            id: RecordId(3),
            owner: Some("u2".into()),
        });
        assert!(handle.try_recv().is_err());

        manager.broadcast(&StoreEvent::Updated {
            record: make_record(Collection::Habits, "u1"),
        });
        assert!(handle.try_recv().is_ok());
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let manager = SubscriptionManager::new();
        let _handle = manager.subscribe(SubscriptionConfig {
            buffer_size: 2,
            filter: SubscriptionFilter::all(),
        });

        for _ in 0..10 {
            manager.broadcast(&StoreEvent::Inserted {
                record: make_record(Collection::Habits, "u1"),
            });
        }

        assert_eq!(manager.subscription_count(), 0);
    }
}
