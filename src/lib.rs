//! # habitline
//!
//! Daily habit tracking: habits with an icon and a daily target, per-day
//! completion counters, and a streak of days on which every habit met its
//! target.
//!
//! ## Core Concepts
//!
//! - **Aggregation**: pure functions over cached rows ([`completion_count_for`],
//!   [`is_done`], [`calculate_streak`])
//! - **Mutator**: turns add/delete/increment intents into store calls and
//!   reconciles an explicit [`TrackerState`]
//! - **Record stores**: the [`RecordStore`] contract with in-memory and
//!   file-backed implementations
//! - **Subscriptions**: live change feed from a store
//!
//! ## Example
//!
//! ```ignore
//! use habitline::{MemoryStore, Mutator, TrackerState, UserId};
//!
//! let store = MemoryStore::new();
//! store.sign_in(UserId::new("alice"));
//!
//! let tracker = Mutator::new(&store);
//! let mut state = TrackerState::new();
//! tracker.refresh(&mut state)?;
//!
//! let habit = tracker.add_habit(&mut state, "Stretch", "🧘", 2)?;
//! tracker.increment_completion(&mut state, habit.id)?;
//! tracker.increment_completion(&mut state, habit.id)?;
//!
//! assert_eq!(tracker.streak(&state), 1);
//! ```

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod error;
pub mod mutator;
pub mod records;
pub mod state;
pub mod streak;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use aggregate::{completion_count_for, is_done, progress_for, HabitProgress};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::TrackerConfig;
pub use error::{Result, StoreError, TrackerError, TrackerResult, ValidationError};
pub use mutator::{validate_new_habit, Mutator};
pub use records::{
    Condition, FileStore, Filter, MemoryStore, Mutation, MutationLog, Op, OrderBy, Patch,
    RecordStore, StoreConfig, Tables,
};
pub use state::TrackerState;
pub use streak::{calculate_streak, day_completed, window_start, MAX_STREAK_DAYS};
pub use subscriptions::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, SubscriptionManager,
};
pub use types::*;
