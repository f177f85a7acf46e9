//! Consecutive-day streak across all habits.

use crate::aggregate::{completion_count_for, is_done};
use crate::types::{Completion, Habit};
use chrono::NaiveDate;

/// Upper bound on the days a streak scan looks at. A streak of exactly
/// this length is indistinguishable from a longer one.
pub const MAX_STREAK_DAYS: u32 = 365;

/// Whether every habit met its current target on `date`. A day with no
/// habits never counts.
pub fn day_completed(habits: &[Habit], completions: &[Completion], date: NaiveDate) -> bool {
    !habits.is_empty()
        && habits.iter().all(|habit| {
            is_done(
                completion_count_for(habit.id, date, completions),
                habit.target_count,
            )
        })
}

/// Number of consecutive fully completed days ending at and including
/// `today`, walking backward and stopping at the first day that falls
/// short. Result is in `0..=MAX_STREAK_DAYS`.
pub fn calculate_streak(habits: &[Habit], completions: &[Completion], today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut date = today;

    while streak < MAX_STREAK_DAYS && day_completed(habits, completions, date) {
        streak += 1;
        match date.pred_opt() {
            Some(prev) => date = prev,
            None => break,
        }
    }

    streak
}

/// First day of the `days`-long window ending at `today`. A window of
/// `MAX_STREAK_DAYS` covers every day a streak can reach.
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(chrono::Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletionId, HabitId, Timestamp, UserId};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn habit(id: u64, target: u32) -> Habit {
        Habit {
            id: HabitId(id),
            owner: UserId::new("u1"),
            name: format!("habit {id}"),
            icon: "✅".into(),
            target_count: target,
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }
    }

    fn done(habit: u64, days_ago: u64, count: u32) -> Completion {
        Completion {
            id: CompletionId(habit * 1000 + days_ago),
            habit_id: HabitId(habit),
            owner: UserId::new("u1"),
            completion_date: today() - chrono::Days::new(days_ago),
            count,
            target_count: 1,
        }
    }

    #[test]
    fn test_no_habits_is_zero() {
        assert_eq!(calculate_streak(&[], &[done(1, 0, 5)], today()), 0);
    }

    #[test]
    fn test_today_incomplete_is_zero() {
        let habits = vec![habit(1, 1)];
        let completions = vec![done(1, 1, 1), done(1, 2, 1)];
        assert_eq!(calculate_streak(&habits, &completions, today()), 0);
    }

    #[test]
    fn test_uses_live_habit_target() {
        // Snapshot target on the completion says 1, the habit now wants 2.
        let habits = vec![habit(1, 2)];
        let completions = vec![done(1, 0, 1)];
        assert_eq!(calculate_streak(&habits, &completions, today()), 0);

        let completions = vec![done(1, 0, 2), done(1, 1, 3)];
        assert_eq!(calculate_streak(&habits, &completions, today()), 2);
    }

    #[test]
    fn test_capped_at_max() {
        let habits = vec![habit(1, 1)];
        let completions: Vec<_> = (0..400).map(|d| done(1, d, 1)).collect();
        assert_eq!(calculate_streak(&habits, &completions, today()), MAX_STREAK_DAYS);
    }

    #[test]
    fn test_window_start() {
        let start = window_start(today(), MAX_STREAK_DAYS);
        assert_eq!((today() - start).num_days(), i64::from(MAX_STREAK_DAYS) - 1);
        assert_eq!(window_start(today(), 1), today());
        assert_eq!(window_start(today(), 0), today());
        assert_eq!(window_start(NaiveDate::MIN, 7), NaiveDate::MIN);
    }

    #[test]
    fn test_start_of_calendar() {
        let habits = vec![habit(1, 1)];
        let completions = vec![Completion {
            completion_date: NaiveDate::MIN,
            ..done(1, 0, 1)
        }];
        assert_eq!(calculate_streak(&habits, &completions, NaiveDate::MIN), 1);
    }
}
