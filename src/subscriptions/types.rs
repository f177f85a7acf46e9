//! Subscription types for live store updates.

use crate::types::{Collection, Record, RecordId};
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 256
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            filter: SubscriptionFilter::default(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Collections to watch (None = all collections).
    pub collections: Option<Vec<Collection>>,

    /// Only rows with this owner (None = any owner).
    pub owner: Option<String>,
}

impl SubscriptionFilter {
    /// Subscribe to every change.
    pub fn all() -> Self {
        Self::default()
    }

    /// Subscribe to one collection.
    pub fn collection(collection: Collection) -> Self {
        Self {
            collections: Some(vec![collection]),
            ..Default::default()
        }
    }

    /// Restrict to rows owned by `owner`.
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub(crate) fn matches(&self, event: &StoreEvent) -> bool {
        let (collection, owner) = match event {
            StoreEvent::Inserted { record } | StoreEvent::Updated { record } => {
                (record.collection, record.owner())
            }
            StoreEvent::Deleted {
                collection, owner, ..
            } => (*collection, owner.as_deref()),
            StoreEvent::Dropped { .. } => return true,
        };

        if let Some(ref collections) = self.collections {
            if !collections.contains(&collection) {
                return false;
            }
        }

        match (&self.owner, owner) {
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// Events emitted by subscriptions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A row was inserted.
    Inserted { record: Record },

    /// A row was updated; carries the new value.
    Updated { record: Record },

    /// A row was deleted (directly or by cascade).
    Deleted {
        collection: Collection,
        id: RecordId,
        owner: Option<String>,
    },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StoreEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
