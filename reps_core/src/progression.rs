//! Progression engine: experience points and levels.
//!
//! Completing a workout is worth a fixed bonus. Experience rolls over into
//! levels; each level needs 20% more experience than the previous one
//! (rounded down), and one award may cross several levels at once.
//!
//! Every award is a read-modify-write of [`PROGRESSION_KEY`] committed with
//! compare-and-swap, so two processes finishing workouts at the same moment
//! both get credited.

use crate::clock::SharedClock;
use crate::store::{SharedStore, PROGRESSION_KEY};
use crate::{Error, ProgressionState, Result};
use chrono::{DateTime, Duration, Utc};

/// Experience granted for finishing a workout
pub const COMPLETION_BONUS_XP: u64 = 50;

/// How long after a level-up it still counts as "recent"
pub const LEVEL_UP_WINDOW_SECONDS: i64 = 5;

/// Attempts before a contended award gives up
const MAX_WRITE_ATTEMPTS: usize = 16;

/// Outcome of an experience award
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Award {
    pub state: ProgressionState,
    pub did_level_up: bool,
    pub previous_level: u32,
}

/// Whether a level-up happened within the last five seconds
///
/// Pure function of its inputs, so every display can poll it independently.
pub fn is_recent_level_up(now: DateTime<Utc>, last_level_up: Option<DateTime<Utc>>) -> bool {
    last_level_up.is_some_and(|at| {
        let elapsed = now - at;
        elapsed >= Duration::zero() && elapsed < Duration::seconds(LEVEL_UP_WINDOW_SECONDS)
    })
}

/// Next level threshold: `floor(threshold * 1.2)`, never below 1
fn next_threshold(threshold: u64) -> u64 {
    (threshold.saturating_mul(6) / 5).max(1)
}

impl ProgressionState {
    /// Add experience and roll any overflow into levels
    ///
    /// Returns the number of levels gained.
    pub fn apply_experience(&mut self, amount: u64, now: DateTime<Utc>) -> u32 {
        self.xp = self.xp.saturating_add(amount);
        self.xp_to_next_level = self.xp_to_next_level.max(1);

        let mut gained = 0;
        while self.xp >= self.xp_to_next_level {
            self.xp -= self.xp_to_next_level;
            self.level = self.level.saturating_add(1);
            self.xp_to_next_level = next_threshold(self.xp_to_next_level);
            gained += 1;
        }

        if gained > 0 {
            self.last_level_up_timestamp = Some(now);
        }
        gained
    }

    /// Whether this state's last level-up is still within the celebration window
    pub fn leveled_up_recently(&self, now: DateTime<Utc>) -> bool {
        is_recent_level_up(now, self.last_level_up_timestamp)
    }
}

/// Owner of the persisted [`ProgressionState`]
pub struct ProgressionEngine {
    store: SharedStore,
    clock: SharedClock,
}

impl ProgressionEngine {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Current progression; defaults are written through on first use
    pub fn get_progression(&self) -> ProgressionState {
        match self.store.get(PROGRESSION_KEY) {
            Ok(Some(raw)) => parse_progression(&raw),
            Ok(None) => {
                let state = ProgressionState::default();
                let seeded = serde_json::to_string(&state)
                    .map_err(Error::from)
                    .and_then(|contents| {
                        self.store.compare_and_swap(PROGRESSION_KEY, None, &contents)
                    });
                if let Err(e) = seeded {
                    tracing::warn!("Failed to seed progression state: {}", e);
                }
                state
            }
            Err(e) => {
                tracing::warn!("Unable to read progression state: {}. Using defaults.", e);
                ProgressionState::default()
            }
        }
    }

    /// Add `amount` experience, leveling up as often as it allows
    pub fn grant_experience(&self, amount: u64) -> Result<Award> {
        self.update(|state, now| {
            let previous_level = state.level;
            let gained = state.apply_experience(amount, now);
            if gained > 0 {
                tracing::info!(
                    "Level up: {} -> {} (+{} xp)",
                    previous_level,
                    state.level,
                    amount
                );
            }
            (previous_level, gained > 0)
        })
    }

    /// Count a finished workout and grant the completion bonus
    ///
    /// The count and the experience are committed in one write.
    pub fn record_completion(&self, workout_type: &str) -> Result<Award> {
        let award = self.update(|state, now| {
            let count = state
                .completed_workouts
                .entry(workout_type.to_string())
                .or_insert(0);
            *count = count.saturating_add(1);
            let previous_level = state.level;
            let gained = state.apply_experience(COMPLETION_BONUS_XP, now);
            (previous_level, gained > 0)
        })?;

        tracing::info!(
            "Recorded completion of {} ({} total)",
            workout_type,
            award.state.completed_workouts[workout_type]
        );
        Ok(award)
    }

    /// Completed sessions across all workout types
    pub fn total_completed_workouts(&self) -> u64 {
        self.get_progression().total_completed()
    }

    /// Forget all progression
    pub fn factory_reset(&self) -> Result<()> {
        self.store.remove(PROGRESSION_KEY)?;
        tracing::info!("Progression reset");
        Ok(())
    }

    /// Optimistic read-modify-write of the progression state
    fn update<F>(&self, mut apply: F) -> Result<Award>
    where
        F: FnMut(&mut ProgressionState, DateTime<Utc>) -> (u32, bool),
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.store.get(PROGRESSION_KEY)?;
            let mut state = current
                .as_deref()
                .map(parse_progression)
                .unwrap_or_default();

            let (previous_level, did_level_up) = apply(&mut state, self.clock.now());
            let contents = serde_json::to_string(&state)?;

            if self
                .store
                .compare_and_swap(PROGRESSION_KEY, current.as_deref(), &contents)?
            {
                return Ok(Award {
                    state,
                    did_level_up,
                    previous_level,
                });
            }
            tracing::debug!("Progression changed underneath us, retrying (attempt {})", attempt);
        }

        Err(Error::Conflict(format!(
            "progression update lost {} races in a row",
            MAX_WRITE_ATTEMPTS
        )))
    }
}

/// Parse stored progression; unreadable or impossible values fall back to defaults
fn parse_progression(raw: &str) -> ProgressionState {
    match serde_json::from_str::<ProgressionState>(raw) {
        Ok(state)
            if state.level >= 1
                && state.xp_to_next_level >= 1
                && state.xp < state.xp_to_next_level =>
        {
            state
        }
        Ok(state) => {
            tracing::warn!(
                "Progression state out of range (level {}, xp {}/{}). Using defaults.",
                state.level,
                state.xp,
                state.xp_to_next_level
            );
            ProgressionState::default()
        }
        Err(e) => {
            tracing::warn!("Failed to parse progression state: {}. Using defaults.", e);
            ProgressionState::default()
        }
    }
}
