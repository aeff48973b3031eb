//! Core domain types for the Reps workout companion.
//!
//! This module defines the fundamental types used throughout the system:
//! - Exercises and workouts (the catalog)
//! - Session snapshots for the interval engine
//! - Progression state (experience and levels)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Catalog Types
// ============================================================================

/// A single exercise within a workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    /// Target number of sets, always at least one
    pub sets: u32,
    /// Free-text rep descriptor, e.g. "8-12 reps" or "Max reps"
    pub reps: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
}

/// An ordered list of exercises performed as one session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workout {
    pub title: String,
    pub exercises: Vec<Exercise>,
}

/// All known workouts keyed by workout type (e.g. "chest-biceps")
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Catalog {
    pub workouts: BTreeMap<String, Workout>,
}

// ============================================================================
// Session Types
// ============================================================================

/// Which interval of a set is running
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Work,
    Rest,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "WORK",
            Phase::Rest => "REST",
        }
    }
}

/// Fixed durations of the two interval phases
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalTiming {
    pub work_seconds: u32,
    pub rest_seconds: u32,
}

impl IntervalTiming {
    pub fn duration_of(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Work => self.work_seconds,
            Phase::Rest => self.rest_seconds,
        }
    }
}

impl Default for IntervalTiming {
    fn default() -> Self {
        Self {
            work_seconds: 60,
            rest_seconds: 60,
        }
    }
}

/// Snapshot of an in-progress workout session
///
/// `current_set` is 1-based, `current_exercise_index` is 0-based.
/// A snapshot with `completed = true` is terminal and never resumed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub workout_type: String,
    pub current_exercise_index: usize,
    pub current_set: u32,
    pub phase: Phase,
    pub remaining_seconds: u32,
    pub last_updated_timestamp: DateTime<Utc>,
    pub completed: bool,
}

impl SessionState {
    /// A session at the first set of the first exercise, ready to work
    pub fn fresh(workout_type: &str, timing: IntervalTiming, now: DateTime<Utc>) -> Self {
        Self {
            workout_type: workout_type.to_string(),
            current_exercise_index: 0,
            current_set: 1,
            phase: Phase::Work,
            remaining_seconds: timing.work_seconds,
            last_updated_timestamp: now,
            completed: false,
        }
    }

    /// Share of the workout's exercises already behind the current one
    pub fn progress_fraction(&self, total_exercises: usize) -> f64 {
        if total_exercises == 0 {
            return 0.0;
        }
        self.current_exercise_index as f64 / total_exercises as f64
    }
}

// ============================================================================
// Progression Types
// ============================================================================

/// Experience and level of the user
///
/// After every award `xp < xp_to_next_level` holds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionState {
    pub level: u32,
    pub xp: u64,
    pub xp_to_next_level: u64,
    #[serde(default)]
    pub completed_workouts: HashMap<String, u32>,
    #[serde(default)]
    pub last_level_up_timestamp: Option<DateTime<Utc>>,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            xp_to_next_level: 100,
            completed_workouts: HashMap::new(),
            last_level_up_timestamp: None,
        }
    }
}

impl ProgressionState {
    /// Percentage of the current level already earned, rounded down
    pub fn xp_percentage(&self) -> u32 {
        if self.xp_to_next_level == 0 {
            return 0;
        }
        let xp = self.xp.min(self.xp_to_next_level) as u128;
        (xp * 100 / self.xp_to_next_level as u128) as u32
    }

    /// Completed sessions across all workout types
    pub fn total_completed(&self) -> u64 {
        self.completed_workouts.values().map(|&n| n as u64).sum()
    }
}

/// Format a second count as `m:ss`
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
