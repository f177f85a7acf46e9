//! Locally cached habits and completions owned by the presentation layer.

use crate::types::{Completion, Habit, HabitId};
use chrono::NaiveDate;

/// Cached view of the signed-in user's data.
///
/// The mutator only changes this after the store confirms a write, and
/// always with the store's returned row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackerState {
    pub habits: Vec<Habit>,
    pub completions: Vec<Completion>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn habit(&self, id: HabitId) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == id)
    }

    /// Cached completion for a habit on a date.
    pub fn completion(&self, habit_id: HabitId, date: NaiveDate) -> Option<&Completion> {
        self.completions
            .iter()
            .find(|c| c.habit_id == habit_id && c.completion_date == date)
    }

    pub(crate) fn push_habit(&mut self, habit: Habit) {
        self.habits.push(habit);
    }

    /// Drop a habit and its cached completions.
    pub(crate) fn remove_habit(&mut self, id: HabitId) {
        self.habits.retain(|h| h.id != id);
        self.completions.retain(|c| c.habit_id != id);
    }

    /// Replace the cached row with the same id, or the cached row for the
    /// same habit and day, or append.
    pub(crate) fn upsert_completion(&mut self, completion: Completion) {
        let slot = self.completions.iter().position(|c| {
            c.id == completion.id
                || (c.habit_id == completion.habit_id
                    && c.completion_date == completion.completion_date)
        });
        match slot {
            Some(i) => self.completions[i] = completion,
            None => self.completions.push(completion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletionId, UserId};

    fn completion(id: u64, habit: u64, count: u32) -> Completion {
        Completion {
            id: CompletionId(id),
            habit_id: HabitId(habit),
            owner: UserId::new("u1"),
            completion_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            count,
            target_count: 1,
        }
    }

    #[test]
    fn test_upsert_replaces_same_day_row() {
        let mut state = TrackerState::new();
        state.upsert_completion(completion(1, 1, 1));
        state.upsert_completion(completion(1, 1, 2));
        // Different id but same habit/day: stale row is replaced.
        state.upsert_completion(completion(5, 1, 3));
        state.upsert_completion(completion(6, 2, 1));

        assert_eq!(state.completions.len(), 2);
        assert_eq!(state.completions[0].count, 3);
        assert_eq!(state.completions[0].id, CompletionId(5));
    }

    #[test]
    fn test_remove_habit_drops_completions() {
        let mut state = TrackerState::new();
        state.upsert_completion(completion(1, 1, 1));
        state.upsert_completion(completion(2, 2, 1));

        state.remove_habit(HabitId(1));
        assert_eq!(state.completions.len(), 1);
        assert_eq!(state.completions[0].habit_id, HabitId(2));
    }
}
