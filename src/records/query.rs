//! Filters, ordering and partial updates understood by every record store.

use crate::error::{Result, StoreError};
use crate::types::{Fields, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison applied by a [`Condition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Eq,
    Gte,
    Lte,
}

/// One `field <op> value` predicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

impl Condition {
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.get(&self.field) else {
            return false;
        };
        match compare_values(&actual, &self.value) {
            Some(ordering) => match self.op {
                Op::Eq => ordering == Ordering::Equal,
                Op::Gte => ordering != Ordering::Less,
                Op::Lte => ordering != Ordering::Greater,
            },
            None => false,
        }
    }
}

/// Conjunction of conditions. An empty filter matches every row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    /// Filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Eq, value)
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Gte, value)
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Lte, value)
    }

    fn with(mut self, field: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

/// Sort order for query results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }

    /// Sort records in place. Rows missing the field sort last; ties keep
    /// id order.
    pub fn sort(&self, records: &mut [Record]) {
        records.sort_by(|a, b| {
            let ordering = match (a.get(&self.field), b.get(&self.field)) {
                (Some(x), Some(y)) => compare_values(&x, &y).unwrap_or(Ordering::Equal),
                (Some(_), None) => return Ordering::Less,
                (None, Some(_)) => return Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = if self.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            ordering.then(a.id.cmp(&b.id))
        });
    }
}

/// Partial update: plain assignments plus atomic integer increments.
///
/// Increments are applied by the store against its current row value, so
/// concurrent increments compound instead of overwriting each other.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub set: Fields,
    pub increment: Vec<(String, i64)>,
}

/// Columns a patch may never touch.
const PROTECTED_FIELDS: &[&str] = &["id", "created_at", "updated_at", "owner"];

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch that adds `by` to an integer field.
    pub fn increment(field: impl Into<String>, by: i64) -> Self {
        Self::new().and_increment(field, by)
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn and_increment(mut self, field: impl Into<String>, by: i64) -> Self {
        self.increment.push((field.into(), by));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.increment.is_empty()
    }

    /// Apply the patch to a copy of `fields`.
    pub(crate) fn apply_to(&self, fields: &Fields) -> Result<Fields> {
        let mut out = fields.clone();

        for (field, value) in &self.set {
            reject_protected(field)?;
            out.insert(field.clone(), value.clone());
        }

        for (field, by) in &self.increment {
            reject_protected(field)?;
            let current = match out.get(field) {
                Some(value) => value.as_i64().ok_or_else(|| {
                    StoreError::Rejected(format!("field {field} is not an integer"))
                })?,
                None => {
                    return Err(StoreError::Rejected(format!(
                        "cannot increment missing field {field}"
                    )))
                }
            };
            let next = current
                .checked_add(*by)
                .filter(|n| *n >= 0)
                .ok_or_else(|| {
                    StoreError::Rejected(format!("increment of {field} by {by} out of range"))
                })?;
            out.insert(field.clone(), Value::from(next));
        }

        Ok(out)
    }
}

fn reject_protected(field: &str) -> Result<()> {
    if PROTECTED_FIELDS.contains(&field) {
        return Err(StoreError::Rejected(format!("field {field} is read-only")));
    }
    Ok(())
}

/// Compare two JSON scalars of the same kind. Mixed kinds do not compare.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                Some(x.cmp(&y))
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                Some(x.cmp(&y))
            } else {
                x.as_f64()?.partial_cmp(&y.as_f64()?)
            }
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Collection, RecordId, Timestamp};
    use serde_json::json;

    fn record(id: u64, fields: Value) -> Record {
        Record {
            id: RecordId(id),
            collection: Collection::HabitCompletions,
            created_at: Timestamp(id as i64),
            updated_at: Timestamp(id as i64),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_date_range_filter() {
        let filter = Filter::all()
            .gte("completion_date", "2024-01-02")
            .lte("completion_date", "2024-01-03");

        assert!(!filter.matches(&record(1, json!({"completion_date": "2024-01-01"}))));
        assert!(filter.matches(&record(2, json!({"completion_date": "2024-01-02"}))));
        assert!(filter.matches(&record(3, json!({"completion_date": "2024-01-03"}))));
        assert!(!filter.matches(&record(4, json!({"completion_date": "2024-01-04"}))));
    }

    #[test]
    fn test_missing_field_or_kind_mismatch_does_not_match() {
        let filter = Filter::all().eq("habit_id", 5);
        assert!(!filter.matches(&record(1, json!({}))));
        assert!(!filter.matches(&record(1, json!({"habit_id": "5"}))));
        assert!(filter.matches(&record(1, json!({"habit_id": 5}))));
    }

    #[test]
    fn test_order_by_desc_then_id() {
        let mut rows = vec![
            record(1, json!({"count": 2})),
            record(2, json!({"count": 5})),
            record(3, json!({"count": 2})),
            record(4, json!({})),
        ];
        OrderBy::desc("count").sort(&mut rows);
        let ids: Vec<u64> = rows.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_patch_increment() {
        let fields = json!({"count": 3}).as_object().cloned().unwrap();
        let out = Patch::increment("count", 1).apply_to(&fields).unwrap();
        assert_eq!(out["count"], 4);
    }

    #[test]
    fn test_patch_rejects_protected_and_negative() {
        let fields = json!({"count": 0, "owner": "u1"}).as_object().cloned().unwrap();

        let result = Patch::new().set("owner", "u2").apply_to(&fields);
        assert!(matches!(result, Err(StoreError::Rejected(_))));

        let result = Patch::increment("count", -1).apply_to(&fields);
        assert!(matches!(result, Err(StoreError::Rejected(_))));

        let result = Patch::increment("missing", 1).apply_to(&fields);
        assert!(matches!(result, Err(StoreError::Rejected(_))));
    }
}
