//! In-memory table state shared by the store backends.
//!
//! Writes happen in two steps: `prepare_*` validates a request against the
//! current rows and produces a [`Mutation`] without changing anything, and
//! [`Tables::apply`] makes it visible. The file backend logs the mutation
//! between the two, so replaying the log reproduces the same tables.

use super::query::{Filter, OrderBy, Patch};
use crate::error::{Result, StoreError};
use crate::subscriptions::StoreEvent;
use crate::types::{Collection, Fields, Record, RecordId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A validated change to the tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    Insert(Record),
    /// Full row after the update.
    Update(Record),
    Delete { collection: Collection, id: RecordId },
}

impl Mutation {
    /// Row written by an insert or update.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Mutation::Insert(record) | Mutation::Update(record) => Some(record),
            Mutation::Delete { .. } => None,
        }
    }
}

/// Rows of every collection, keyed by id.
#[derive(Debug)]
pub struct Tables {
    rows: HashMap<Collection, BTreeMap<RecordId, Record>>,
    next_id: u64,
}

impl Tables {
    pub fn new() -> Self {
        let rows = Collection::ALL
            .iter()
            .map(|c| (*c, BTreeMap::new()))
            .collect();
        Self { rows, next_id: 1 }
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.rows.get(&collection).map_or(0, BTreeMap::len)
    }

    fn table(&self, collection: Collection) -> impl Iterator<Item = &Record> {
        self.rows.get(&collection).into_iter().flat_map(|t| t.values())
    }

    fn get(&self, collection: Collection, id: RecordId) -> Option<&Record> {
        self.rows.get(&collection).and_then(|t| t.get(&id))
    }

    /// Rows owned by `user` matching `filter`.
    pub fn query(
        &self,
        user: &UserId,
        collection: Collection,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Vec<Record> {
        let mut out: Vec<Record> = self
            .table(collection)
            .filter(|r| r.owner() == Some(user.as_str()) && filter.matches(r))
            .cloned()
            .collect();
        if let Some(order) = order {
            order.sort(&mut out);
        }
        out
    }

    pub fn prepare_insert(
        &self,
        user: &UserId,
        collection: Collection,
        fields: Fields,
        now: Timestamp,
    ) -> Result<Mutation> {
        for reserved in ["id", "created_at", "updated_at"] {
            if fields.contains_key(reserved) {
                return Err(StoreError::Rejected(format!(
                    "field {reserved} is assigned by the store"
                )));
            }
        }
        match fields.get("owner").and_then(Value::as_str) {
            Some(owner) if owner == user.as_str() => {}
            Some(owner) => {
                return Err(StoreError::PermissionDenied(format!(
                    "cannot insert into {collection} on behalf of {owner}"
                )))
            }
            None => {
                return Err(StoreError::Rejected(format!(
                    "{collection} rows require an owner"
                )))
            }
        }

        let record = Record {
            id: RecordId(self.next_id),
            collection,
            created_at: now,
            updated_at: now,
            fields,
        };
        self.check_references(user, &record)?;
        self.check_unique(&record)?;
        Ok(Mutation::Insert(record))
    }

    pub fn prepare_update(
        &self,
        user: &UserId,
        collection: Collection,
        id: RecordId,
        patch: &Patch,
        now: Timestamp,
    ) -> Result<Mutation> {
        let current = self.owned(user, collection, id)?;
        let fields = patch.apply_to(&current.fields)?;
        let record = Record {
            fields,
            updated_at: now,
            ..current.clone()
        };
        self.check_references(user, &record)?;
        self.check_unique(&record)?;
        Ok(Mutation::Update(record))
    }

    pub fn prepare_delete(
        &self,
        user: &UserId,
        collection: Collection,
        id: RecordId,
    ) -> Result<Mutation> {
        self.owned(user, collection, id)?;
        Ok(Mutation::Delete { collection, id })
    }

    /// Make a prepared mutation visible. Deleting a habit also deletes its
    /// owner's completions of it. Returns the resulting change events.
    pub fn apply(&mut self, mutation: &Mutation) -> Vec<StoreEvent> {
        match mutation {
            Mutation::Insert(record) => {
                self.next_id = self.next_id.max(record.id.0 + 1);
                self.rows
                    .entry(record.collection)
                    .or_default()
                    .insert(record.id, record.clone());
                vec![StoreEvent::Inserted {
                    record: record.clone(),
                }]
            }
            Mutation::Update(record) => {
                self.rows
                    .entry(record.collection)
                    .or_default()
                    .insert(record.id, record.clone());
                vec![StoreEvent::Updated {
                    record: record.clone(),
                }]
            }
            Mutation::Delete { collection, id } => {
                let mut events = Vec::new();
                let Some(removed) = self.rows.entry(*collection).or_default().remove(id) else {
                    return events;
                };

                if *collection == Collection::Habits {
                    let owner = removed.owner();
                    let completions = self.rows.entry(Collection::HabitCompletions).or_default();
                    let orphaned: Vec<RecordId> = completions
                        .values()
                        .filter(|c| {
                            c.owner() == owner && c.fields.get("habit_id") == Some(&Value::from(id.0))
                        })
                        .map(|c| c.id)
                        .collect();
                    for child in orphaned {
                        if let Some(row) = completions.remove(&child) {
                            events.push(StoreEvent::Deleted {
                                collection: Collection::HabitCompletions,
                                id: child,
                                owner: row.owner().map(str::to_string),
                            });
                        }
                    }
                }

                events.push(StoreEvent::Deleted {
                    collection: *collection,
                    id: *id,
                    owner: removed.owner().map(str::to_string),
                });
                events
            }
        }
    }

    fn owned(&self, user: &UserId, collection: Collection, id: RecordId) -> Result<&Record> {
        let record = self
            .get(collection, id)
            .ok_or(StoreError::NotFound(id))?;
        if record.owner() != Some(user.as_str()) {
            return Err(StoreError::PermissionDenied(format!(
                "{collection} row {id} belongs to another user"
            )));
        }
        Ok(record)
    }

    /// A completion's `habit_id`, when set, must name a habit of `user`.
    fn check_references(&self, user: &UserId, candidate: &Record) -> Result<()> {
        if candidate.collection != Collection::HabitCompletions {
            return Ok(());
        }
        let Some(value) = candidate.fields.get("habit_id") else {
            return Ok(());
        };
        let habit = value
            .as_u64()
            .and_then(|raw| self.get(Collection::Habits, RecordId(raw)));
        match habit {
            Some(habit) if habit.owner() == Some(user.as_str()) => Ok(()),
            Some(_) => Err(StoreError::PermissionDenied(format!(
                "habit {value} belongs to another user"
            ))),
            None => Err(StoreError::Rejected(format!("no habit with id {value}"))),
        }
    }

    /// Rows of the same owner may not share the collection's unique key.
    fn check_unique(&self, candidate: &Record) -> Result<()> {
        let Some(key) = candidate.collection.unique_key() else {
            return Ok(());
        };
        let values: Vec<Option<&Value>> = key.iter().map(|f| candidate.fields.get(*f)).collect();
        if values.iter().any(Option::is_none) {
            return Ok(());
        }

        let clash = self.table(candidate.collection).any(|row| {
            row.id != candidate.id
                && row.owner() == candidate.owner()
                && key
                    .iter()
                    .zip(&values)
                    .all(|(field, value)| row.fields.get(*field) == *value)
        });

        if clash {
            let described: Vec<String> = key
                .iter()
                .zip(&values)
                .map(|(field, value)| format!("{field}={}", value.map_or("null".into(), |v| v.to_string())))
                .collect();
            return Err(StoreError::Conflict(format!(
                "{} row with {} already exists",
                candidate.collection,
                described.join(", ")
            )));
        }
        Ok(())
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::new()
    }
}
