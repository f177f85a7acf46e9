//! Per-day completion counts and the "done" rule.

use crate::types::{Completion, Habit, HabitId};
use chrono::NaiveDate;
use serde::Serialize;

/// How many times `habit_id` was completed on `date`.
///
/// Uses the first matching record; returns 0 when there is none.
pub fn completion_count_for(habit_id: HabitId, date: NaiveDate, completions: &[Completion]) -> u32 {
    completions
        .iter()
        .find(|c| c.habit_id == habit_id && c.completion_date == date)
        .map_or(0, |c| c.count)
}

/// A habit is done for a day once its count reaches the target.
pub fn is_done(count: u32, target_count: u32) -> bool {
    count >= target_count
}

/// Progress of one habit on one day, ready for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HabitProgress {
    pub habit_id: HabitId,
    pub name: String,
    pub icon: String,
    pub count: u32,
    pub target: u32,
    pub done: bool,
}

/// Progress for every habit on `date`, in habit order.
pub fn progress_for(habits: &[Habit], completions: &[Completion], date: NaiveDate) -> Vec<HabitProgress> {
    habits
        .iter()
        .map(|habit| {
            let count = completion_count_for(habit.id, date, completions);
            HabitProgress {
                habit_id: habit.id,
                name: habit.name.clone(),
                icon: habit.icon.clone(),
                count,
                target: habit.target_count,
                done: is_done(count, habit.target_count),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletionId, Timestamp, UserId};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn completion(id: u64, habit: u64, date: NaiveDate, count: u32) -> Completion {
        Completion {
            id: CompletionId(id),
            habit_id: HabitId(habit),
            owner: UserId::new("u1"),
            completion_date: date,
            count,
            target_count: 1,
        }
    }

    #[test]
    fn test_count_matches_habit_and_date() {
        let completions = vec![
            completion(1, 1, day(1), 3),
            completion(2, 2, day(2), 4),
            completion(3, 1, day(2), 5),
        ];

        assert_eq!(completion_count_for(HabitId(1), day(2), &completions), 5);
        assert_eq!(completion_count_for(HabitId(2), day(2), &completions), 4);
        assert_eq!(completion_count_for(HabitId(2), day(1), &completions), 0);
        assert_eq!(completion_count_for(HabitId(9), day(1), &completions), 0);
    }

    #[test]
    fn test_duplicate_rows_use_first_match() {
        let completions = vec![completion(1, 1, day(1), 2), completion(2, 1, day(1), 7)];
        assert_eq!(completion_count_for(HabitId(1), day(1), &completions), 2);
    }

    #[test]
    fn test_done_boundary() {
        assert!(is_done(3, 3));
        assert!(is_done(4, 3));
        assert!(!is_done(2, 3));
    }

    #[test]
    fn test_progress_for() {
        let habits = vec![Habit {
            id: HabitId(1),
            owner: UserId::new("u1"),
            name: "Water".into(),
            icon: "💧".into(),
            target_count: 8,
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }];
        let completions = vec![completion(1, 1, day(3), 8)];

        let progress = progress_for(&habits, &completions, day(3));
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].count, 8);
        assert!(progress[0].done);

        let progress = progress_for(&habits, &completions, day(4));
        assert_eq!(progress[0].count, 0);
        assert!(!progress[0].done);
    }
}
