//! Volatile record store backed by [`Tables`].

use super::query::{Filter, OrderBy, Patch};
use super::table::{Mutation, Tables};
use super::RecordStore;
use crate::error::{Result, StoreError};
use crate::subscriptions::{SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager};
use crate::types::{Collection, Fields, Record, RecordId, Timestamp, UserId};
use parking_lot::RwLock;

/// Record store that keeps everything in memory.
///
/// All writes go through one lock, so every mutation (including atomic
/// increments) is serialized per store.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    session: RwLock<Option<UserId>>,
    subscriptions: SubscriptionManager,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
            session: RwLock::new(None),
            subscriptions: SubscriptionManager::new(),
        }
    }

    /// Start a session as `user`.
    pub fn sign_in(&self, user: UserId) {
        *self.session.write() = Some(user);
    }

    /// End the current session.
    pub fn sign_out(&self) {
        *self.session.write() = None;
    }

    /// Number of rows in a collection across all owners.
    pub fn len(&self, collection: Collection) -> usize {
        self.tables.read().len(collection)
    }

    pub fn is_empty(&self) -> bool {
        Collection::ALL.iter().all(|c| self.len(*c) == 0)
    }

    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id)
    }

    fn require_user(&self) -> Result<UserId> {
        self.session.read().clone().ok_or(StoreError::Unauthenticated)
    }

    fn commit(&self, prepare: impl FnOnce(&Tables, &UserId) -> Result<Mutation>) -> Result<Mutation> {
        let user = self.require_user()?;
        let (mutation, events) = {
            let mut tables = self.tables.write();
            let mutation = prepare(&*tables, &user)?;
            let events = tables.apply(&mutation);
            (mutation, events)
        };
        for event in &events {
            self.subscriptions.broadcast(event);
        }
        Ok(mutation)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Record of an insert or update; only called on those mutations.
pub(crate) fn written(mutation: Mutation) -> Result<Record> {
    match mutation {
        Mutation::Insert(record) | Mutation::Update(record) => Ok(record),
        Mutation::Delete { id, .. } => Err(StoreError::Corruption(format!(
            "expected a written row, got delete of {id}"
        ))),
    }
}

impl RecordStore for MemoryStore {
    fn query(
        &self,
        collection: Collection,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Record>> {
        let user = self.require_user()?;
        Ok(self.tables.read().query(&user, collection, filter, order))
    }

    fn insert(&self, collection: Collection, fields: Fields) -> Result<Record> {
        written(self.commit(|tables, user| {
            tables.prepare_insert(user, collection, fields, Timestamp::now())
        })?)
    }

    fn update(&self, collection: Collection, id: RecordId, patch: &Patch) -> Result<Record> {
        written(self.commit(|tables, user| {
            tables.prepare_update(user, collection, id, patch, Timestamp::now())
        })?)
    }

    fn delete(&self, collection: Collection, id: RecordId) -> Result<()> {
        self.commit(|tables, user| tables.prepare_delete(user, collection, id))?;
        Ok(())
    }

    fn current_user(&self) -> Option<UserId> {
        self.session.read().clone()
    }
}
