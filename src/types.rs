//! Core types: identifiers, store records, habits and completions.

use crate::error::{Result, StoreError};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Field map carried by a store record.
pub type Fields = serde_json::Map<String, Value>;

/// Unique identifier for a record (assigned by the store).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a habit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(pub u64);

impl fmt::Debug for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HabitId({})", self.0)
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<HabitId> for RecordId {
    fn from(id: HabitId) -> Self {
        RecordId(id.0)
    }
}

/// Identifier of a completion.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionId(pub u64);

impl fmt::Debug for CompletionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompletionId({})", self.0)
    }
}

impl From<CompletionId> for RecordId {
    fn from(id: CompletionId) -> Self {
        RecordId(id.0)
    }
}

/// Identity of an authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        Timestamp(Utc::now().timestamp_micros())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// The two collections the tracker reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Habits,
    HabitCompletions,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Habits, Collection::HabitCompletions];

    /// Collection name as seen by the store.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Habits => "habits",
            Collection::HabitCompletions => "habit_completions",
        }
    }

    /// Fields that together must be unique within the collection.
    pub fn unique_key(self) -> Option<&'static [&'static str]> {
        match self {
            Collection::Habits => None,
            Collection::HabitCompletions => Some(&["habit_id", "completion_date"]),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single row held by a record store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier (assigned by store).
    pub id: RecordId,

    /// Collection the row lives in.
    pub collection: Collection,

    /// When the row was inserted (assigned by store).
    pub created_at: Timestamp,

    /// When the row was last written (assigned by store).
    pub updated_at: Timestamp,

    /// Application fields.
    pub fields: Fields,
}

impl Record {
    /// Look up a field, including the metadata columns `id`, `created_at`
    /// and `updated_at`.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::from(self.id.0)),
            "created_at" => Some(Value::from(self.created_at.0)),
            "updated_at" => Some(Value::from(self.updated_at.0)),
            _ => self.fields.get(field).cloned(),
        }
    }

    /// Owner column, if present.
    pub fn owner(&self) -> Option<&str> {
        self.fields.get("owner").and_then(Value::as_str)
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, expected: Collection) -> Result<T> {
        if self.collection != expected {
            return Err(StoreError::Deserialization(format!(
                "record {} belongs to {}, expected {}",
                self.id, self.collection, expected
            )));
        }
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

/// Serialize a value into a record field map.
pub fn to_fields(value: &impl Serialize) -> Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// A user-defined recurring task with a daily target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub owner: UserId,
    pub name: String,
    pub icon: String,
    pub target_count: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Fields sent to the store when creating a habit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHabit {
    pub owner: UserId,
    pub name: String,
    pub icon: String,
    pub target_count: u32,
}

impl TryFrom<Record> for Habit {
    type Error = StoreError;

    fn try_from(record: Record) -> Result<Self> {
        let fields: NewHabit = record.decode(Collection::Habits)?;
        Ok(Habit {
            id: HabitId(record.id.0),
            owner: fields.owner,
            name: fields.name,
            icon: fields.icon,
            target_count: fields.target_count,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Per-day count of how many times a habit was marked done.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub id: CompletionId,
    pub habit_id: HabitId,
    pub owner: UserId,
    pub completion_date: NaiveDate,
    pub count: u32,
    /// Habit target when the row was created. Informational only.
    pub target_count: u32,
}

/// Fields sent to the store when creating a completion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompletion {
    pub habit_id: HabitId,
    pub owner: UserId,
    pub completion_date: NaiveDate,
    pub count: u32,
    pub target_count: u32,
}

impl TryFrom<Record> for Completion {
    type Error = StoreError;

    fn try_from(record: Record) -> Result<Self> {
        let fields: NewCompletion = record.decode(Collection::HabitCompletions)?;
        Ok(Completion {
            id: CompletionId(record.id.0),
            habit_id: fields.habit_id,
            owner: fields.owner,
            completion_date: fields.completion_date,
            count: fields.count,
            target_count: fields.target_count,
        })
    }
}
