//! Record store contract and backends.
//!
//! The tracker never talks to storage directly; it goes through
//! [`RecordStore`], which exposes query/insert/update/delete over the
//! `habits` and `habit_completions` collections plus the current session.
//! Two backends share the same table semantics (owner scoping, unique
//! completion per habit and day, cascade delete, atomic increments):
//!
//! - [`MemoryStore`]: volatile, for tests and embedding.
//! - [`FileStore`]: a directory with a checksummed append-only log.

mod file;
mod log;
mod memory;
mod query;
mod table;

use crate::error::Result;
use crate::types::{Collection, Fields, Record, RecordId, UserId};
use std::sync::Arc;

pub use file::{FileStore, StoreConfig};
pub use log::MutationLog;
pub use memory::MemoryStore;
pub use query::{Condition, Filter, Op, OrderBy, Patch};
pub use table::{Mutation, Tables};

/// Access to the backing record store.
///
/// Every call requires a signed-in session and only sees rows owned by the
/// session's user.
pub trait RecordStore {
    /// Rows of `collection` matching `filter`, optionally sorted.
    fn query(
        &self,
        collection: Collection,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Record>>;

    /// Insert a row and return it with store-assigned id and timestamps.
    fn insert(&self, collection: Collection, fields: Fields) -> Result<Record>;

    /// Apply `patch` to a row atomically and return the stored result.
    fn update(&self, collection: Collection, id: RecordId, patch: &Patch) -> Result<Record>;

    /// Delete a row.
    fn delete(&self, collection: Collection, id: RecordId) -> Result<()>;

    /// The signed-in user, if any.
    fn current_user(&self) -> Option<UserId>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn query(
        &self,
        collection: Collection,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Record>> {
        (**self).query(collection, filter, order)
    }

    fn insert(&self, collection: Collection, fields: Fields) -> Result<Record> {
        (**self).insert(collection, fields)
    }

    fn update(&self, collection: Collection, id: RecordId, patch: &Patch) -> Result<Record> {
        (**self).update(collection, id, patch)
    }

    fn delete(&self, collection: Collection, id: RecordId) -> Result<()> {
        (**self).delete(collection, id)
    }

    fn current_user(&self) -> Option<UserId> {
        (**self).current_user()
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn query(
        &self,
        collection: Collection,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Record>> {
        (**self).query(collection, filter, order)
    }

    fn insert(&self, collection: Collection, fields: Fields) -> Result<Record> {
        (**self).insert(collection, fields)
    }

    fn update(&self, collection: Collection, id: RecordId, patch: &Patch) -> Result<Record> {
        (**self).update(collection, id, patch)
    }

    fn delete(&self, collection: Collection, id: RecordId) -> Result<()> {
        (**self).delete(collection, id)
    }

    fn current_user(&self) -> Option<UserId> {
        (**self).current_user()
    }
}
