//! Applies user intents to the record store and reconciles the cache.

use crate::aggregate::{progress_for, HabitProgress};
use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::error::{StoreError, TrackerError, TrackerResult, ValidationError};
use crate::records::{Filter, OrderBy, Patch, RecordStore};
use crate::state::TrackerState;
use crate::streak::{calculate_streak, window_start};
use crate::types::{
    to_fields, Collection, Completion, Habit, HabitId, NewCompletion, NewHabit, Record, UserId,
};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Check the inputs of a new habit before anything is sent to the store.
pub fn validate_new_habit(name: &str, icon: &str, target_count: u32) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if icon.is_empty() {
        return Err(ValidationError::EmptyIcon);
    }
    if target_count < 1 {
        return Err(ValidationError::InvalidTarget(target_count));
    }
    Ok(())
}

/// Translates add/delete/increment requests into store calls.
///
/// The cache is passed in explicitly and is only touched after the store
/// confirms a write, using the row the store returned. Failed calls leave
/// it unchanged and are never retried.
pub struct Mutator<S, C = SystemClock> {
    store: S,
    clock: C,
    config: TrackerConfig,
}

impl<S: RecordStore> Mutator<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: RecordStore, C: Clock> Mutator<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            config: TrackerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The local calendar date completions are recorded against.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // --- Loading ---

    /// Replace cached habits with the user's habits, oldest first.
    pub fn load_habits(&self, state: &mut TrackerState) -> TrackerResult<()> {
        let user = self.require_user("load habits")?;
        state.habits = self.fetch_habits(&user)?;
        Ok(())
    }

    /// Replace cached completions with the configured history window.
    pub fn load_completions(&self, state: &mut TrackerState) -> TrackerResult<()> {
        let user = self.require_user("load completions")?;
        state.completions = self.fetch_completions(&user)?;
        Ok(())
    }

    /// Reload habits and completions. The cache is only replaced once both
    /// queries succeed.
    pub fn refresh(&self, state: &mut TrackerState) -> TrackerResult<()> {
        let user = self.require_user("refresh")?;
        let habits = self.fetch_habits(&user)?;
        let completions = self.fetch_completions(&user)?;
        state.habits = habits;
        state.completions = completions;
        Ok(())
    }

    fn fetch_habits(&self, user: &UserId) -> TrackerResult<Vec<Habit>> {
        let records = logged(
            "query habits",
            self.store.query(
                Collection::Habits,
                &Filter::all().eq("owner", user.as_str()),
                Some(&OrderBy::asc("created_at")),
            ),
        )?;
        debug!(count = records.len(), "loaded habits");
        decode_all(records)
    }

    fn fetch_completions(&self, user: &UserId) -> TrackerResult<Vec<Completion>> {
        let today = self.today();
        let start = window_start(today, self.config.effective_history_days());

        let records = logged(
            "query completions",
            self.store.query(
                Collection::HabitCompletions,
                &Filter::all()
                    .eq("owner", user.as_str())
                    .gte("completion_date", start.to_string())
                    .lte("completion_date", today.to_string()),
                Some(&OrderBy::asc("completion_date")),
            ),
        )?;
        debug!(count = records.len(), %start, %today, "loaded completions");
        decode_all(records)
    }

    // --- Mutations ---

    /// Create a habit owned by the current user and append the stored row
    /// to the cache.
    pub fn add_habit(
        &self,
        state: &mut TrackerState,
        name: &str,
        icon: &str,
        target_count: u32,
    ) -> TrackerResult<Habit> {
        if let Err(e) = validate_new_habit(name, icon, target_count) {
            debug!(error = %e, "rejected new habit");
            return Err(e.into());
        }
        let user = self.require_user("add habit")?;

        let fields = to_fields(&NewHabit {
            owner: user,
            name: name.to_string(),
            icon: icon.to_string(),
            target_count,
        })?;
        let record = logged("add habit", self.store.insert(Collection::Habits, fields))?;
        let habit = Habit::try_from(record)?;

        debug!(habit = %habit.id, name = %habit.name, "added habit");
        state.push_habit(habit.clone());
        Ok(habit)
    }

    /// Delete a habit. The cache drops it, and its completions, only after
    /// the store confirms.
    pub fn delete_habit(&self, state: &mut TrackerState, id: HabitId) -> TrackerResult<()> {
        self.require_user("delete habit")?;
        logged("delete habit", self.store.delete(Collection::Habits, id.into()))?;

        debug!(habit = %id, "deleted habit");
        state.remove_habit(id);
        Ok(())
    }

    /// Add one to today's count for a habit.
    ///
    /// An existing row is bumped with an atomic store-side increment;
    /// otherwise a row with count 1 is created. Either way the cache takes
    /// the row the store returned.
    pub fn increment_completion(
        &self,
        state: &mut TrackerState,
        habit_id: HabitId,
    ) -> TrackerResult<Completion> {
        let user = self.require_user("increment completion")?;
        let target_count = match state.habit(habit_id) {
            Some(habit) => habit.target_count,
            None => {
                warn!(habit = %habit_id, "habit not found");
                return Err(TrackerError::HabitNotFound(habit_id));
            }
        };
        let today = self.today();

        let record = match state.completion(habit_id, today) {
            Some(existing) => logged(
                "update completion",
                self.store.update(
                    Collection::HabitCompletions,
                    existing.id.into(),
                    &Patch::increment("count", 1),
                ),
            )?,
            None => self.create_completion(user, habit_id, today, target_count)?,
        };

        let completion = Completion::try_from(record)?;
        debug!(habit = %habit_id, date = %today, count = completion.count, "incremented completion");
        state.upsert_completion(completion.clone());
        Ok(completion)
    }

    fn create_completion(
        &self,
        user: UserId,
        habit_id: HabitId,
        date: NaiveDate,
        target_count: u32,
    ) -> TrackerResult<Record> {
        let fields = to_fields(&NewCompletion {
            habit_id,
            owner: user,
            completion_date: date,
            count: 1,
            target_count,
        })?;

        match self.store.insert(Collection::HabitCompletions, fields) {
            Ok(record) => Ok(record),
            Err(StoreError::Conflict(reason)) if self.config.reconcile_conflicts => {
                debug!(habit = %habit_id, %reason, "completion already exists, incrementing it");
                self.increment_stored(habit_id, date, reason)
            }
            Err(e) => logged("add completion", Err(e)),
        }
    }

    /// Increment the stored row for a habit and day that is missing from
    /// the cache.
    fn increment_stored(&self, habit_id: HabitId, date: NaiveDate, reason: String) -> TrackerResult<Record> {
        let rows = logged(
            "query completion",
            self.store.query(
                Collection::HabitCompletions,
                &Filter::all()
                    .eq("habit_id", habit_id.0)
                    .eq("completion_date", date.to_string()),
                None,
            ),
        )?;
        let Some(row) = rows.into_iter().next() else {
            return logged("add completion", Err(StoreError::Conflict(reason)));
        };
        logged(
            "update completion",
            self.store.update(
                Collection::HabitCompletions,
                row.id,
                &Patch::increment("count", 1),
            ),
        )
    }

    // --- Derived views ---

    /// Current streak over the cached state.
    pub fn streak(&self, state: &TrackerState) -> u32 {
        calculate_streak(&state.habits, &state.completions, self.today())
    }

    /// Today's progress for each cached habit.
    pub fn progress(&self, state: &TrackerState) -> Vec<HabitProgress> {
        progress_for(&state.habits, &state.completions, self.today())
    }

    fn require_user(&self, operation: &'static str) -> TrackerResult<UserId> {
        self.store.current_user().ok_or_else(|| {
            warn!(operation, "user not authenticated");
            TrackerError::AuthRequired
        })
    }
}

fn logged<T>(operation: &'static str, result: Result<T, StoreError>) -> TrackerResult<T> {
    result.map_err(|e| {
        warn!(operation, error = %e, "store call failed");
        TrackerError::Store(e)
    })
}

fn decode_all<T>(records: Vec<Record>) -> TrackerResult<Vec<T>>
where
    T: TryFrom<Record, Error = StoreError>,
{
    records
        .into_iter()
        .map(|r| T::try_from(r).map_err(TrackerError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_new_habit() {
        assert_eq!(validate_new_habit("Read", "📚", 1), Ok(()));
        assert_eq!(validate_new_habit("   ", "📚", 1), Err(ValidationError::EmptyName));
        assert_eq!(validate_new_habit("", "🔥", 3), Err(ValidationError::EmptyName));
        assert_eq!(validate_new_habit("Read", "", 1), Err(ValidationError::EmptyIcon));
        assert_eq!(
            validate_new_habit("Read", "📚", 0),
            Err(ValidationError::InvalidTarget(0))
        );
    }
}
