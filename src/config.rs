//! Tracker configuration.

use crate::streak::MAX_STREAK_DAYS;
use serde::Deserialize;

/// Settings for the [`Mutator`](crate::Mutator).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Days of completions (ending today) loaded into the cache.
    /// Clamped to `1..=MAX_STREAK_DAYS`.
    pub history_days: u32,

    /// When creating today's completion collides with a row another session
    /// created first, increment that row instead of failing.
    pub reconcile_conflicts: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_days: MAX_STREAK_DAYS,
            reconcile_conflicts: true,
        }
    }
}

impl TrackerConfig {
    /// Parse from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub(crate) fn effective_history_days(&self) -> u32 {
        self.history_days.clamp(1, MAX_STREAK_DAYS)
    }
}
