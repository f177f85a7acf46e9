//! Benchmarks for streak calculation and the in-memory store.

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use habitline::{
    calculate_streak, Completion, CompletionId, FixedClock, Habit, HabitId, MemoryStore, Mutator,
    Timestamp, TrackerState, UserId, MAX_STREAK_DAYS,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
}

/// `habit_count` habits, each completed on every day of the past year.
fn full_year(habit_count: u64) -> (Vec<Habit>, Vec<Completion>) {
    let habits: Vec<Habit> = (1..=habit_count)
        .map(|id| Habit {
            id: HabitId(id),
            owner: UserId::new("bench"),
            name: format!("habit {id}"),
            icon: "⭐".into(),
            target_count: 1,
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        })
        .collect();

    let mut completions = Vec::new();
    for habit in &habits {
        for day in 0..u64::from(MAX_STREAK_DAYS) {
            completions.push(Completion {
                id: CompletionId(completions.len() as u64 + 1),
                habit_id: habit.id,
                owner: habit.owner.clone(),
                completion_date: today() - Days::new(day),
                count: 1,
                target_count: 1,
            });
        }
    }
    (habits, completions)
}

/// Benchmark a full-length streak scan with varying habit counts
fn bench_streak(c: &mut Criterion) {
    let mut group = c.benchmark_group("calculate_streak");

    for habit_count in [1, 5, 20] {
        let (habits, completions) = full_year(habit_count);
        group.bench_with_input(
            BenchmarkId::new("habits", habit_count),
            &habit_count,
            |b, _| {
                b.iter(|| black_box(calculate_streak(&habits, &completions, today())));
            },
        );
    }

    group.finish();
}

/// Benchmark increments through the mutator
fn bench_increment(c: &mut Criterion) {
    c.bench_function("increment_completion", |b| {
        let store = MemoryStore::new();
        store.sign_in(UserId::new("bench"));
        let tracker = Mutator::with_clock(&store, FixedClock::new(today()));
        let mut state = TrackerState::new();
        let habit = tracker.add_habit(&mut state, "Bench", "⏱️", 1).unwrap();

        b.iter(|| {
            black_box(tracker.increment_completion(&mut state, habit.id).unwrap());
        });
    });
}

criterion_group!(benches, bench_streak, bench_increment);
criterion_main!(benches);
