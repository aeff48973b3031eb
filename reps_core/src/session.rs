//! Session engine: the work/rest interval state machine.
//!
//! The engine has no thread of its own. A caller drives it with `tick()` once
//! per elapsed second while it is active; user intents map to `skip()`,
//! `extend()` and `set_active()`.
//!
//! ## Transitions
//!
//! ```text
//! WORK --0s--> REST      (next set, or set 1 of the next exercise)
//! WORK --0s--> COMPLETE  (last set of the last exercise)
//! REST --0s--> WORK      (pointers unchanged)
//! ```
//!
//! Set and exercise pointers advance at the WORK -> REST boundary, so a REST
//! interval always shows the set that comes next.
//!
//! Every state change is written through the persistence port under
//! [`SESSION_KEY`]; the snapshot is removed once the workout completes.

use crate::clock::{same_local_day, SharedClock};
use crate::store::{KeyValueStore, SharedStore, SESSION_KEY};
use crate::{
    Catalog, Error, Exercise, IntervalTiming, Phase, Result, SessionState, Workout,
};
use chrono::{DateTime, Utc};

/// Why a stored snapshot was not used as a resume point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardReason {
    /// The stored text did not parse as a snapshot
    Corrupt,
    /// The snapshot belongs to another workout type
    WrongWorkout,
    /// The snapshot was already completed
    Completed,
    /// The snapshot was last touched on an earlier calendar day
    PreviousDay,
    /// Exercise or set pointer no longer fits the catalog
    OutOfRange,
}

/// How `load_or_init` arrived at its starting state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No snapshot existed; a fresh session was started
    Fresh,
    /// A valid snapshot from today was resumed
    Resumed,
    /// A snapshot existed but was rejected; a fresh session was started
    Discarded(DiscardReason),
    /// Reading the store failed; a fresh session was started
    StoreUnavailable,
}

/// Boundary crossed by a tick or skip
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Work ended; `next_exercise` is true when the pointer moved to a new exercise
    EnteredRest { next_exercise: bool },
    /// Rest ended
    EnteredWork,
    /// The final set of the final exercise ended
    Completed,
}

/// Result of a tick or skip
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub state: SessionState,
    pub transition: Option<Transition>,
}

/// Interval state machine for one workout session
pub struct SessionEngine {
    store: SharedStore,
    clock: SharedClock,
    timing: IntervalTiming,
    workout: Workout,
    state: SessionState,
    active: bool,
    load_outcome: LoadOutcome,
    persistence_degraded: bool,
    write_failed: bool,
}

impl SessionEngine {
    /// Resume today's snapshot for `workout_type`, or start a fresh session
    ///
    /// Fails only when the workout type is unknown or unusable; problems with
    /// the stored snapshot fall back to a fresh session and are reported by
    /// [`SessionEngine::load_outcome`].
    pub fn load_or_init(
        store: SharedStore,
        clock: SharedClock,
        timing: IntervalTiming,
        workout_type: &str,
        catalog: &Catalog,
    ) -> Result<Self> {
        let workout = catalog
            .get(workout_type)
            .cloned()
            .ok_or_else(|| Error::UnknownWorkout(workout_type.to_string()))?;

        if workout.exercises.is_empty() {
            return Err(Error::Catalog(format!(
                "Workout '{}' has no exercises",
                workout_type
            )));
        }
        if let Some(bad) = workout.exercises.iter().find(|e| e.sets == 0) {
            return Err(Error::Catalog(format!(
                "Exercise '{}' in '{}' has zero sets",
                bad.name, workout_type
            )));
        }
        if timing.work_seconds == 0 || timing.rest_seconds == 0 {
            return Err(Error::Config("Interval durations must be at least 1s".into()));
        }

        let now = clock.now();
        let fresh = SessionState::fresh(workout_type, timing, now);

        let (state, load_outcome) = match store.get(SESSION_KEY) {
            Err(e) => {
                tracing::warn!("Unable to read session snapshot: {}. Starting fresh.", e);
                (fresh, LoadOutcome::StoreUnavailable)
            }
            Ok(None) => (fresh, LoadOutcome::Fresh),
            Ok(Some(raw)) => match check_snapshot(&raw, workout_type, &workout, now) {
                Ok(state) => {
                    tracing::info!(
                        "Resuming {} at exercise {}, set {}",
                        workout_type,
                        state.current_exercise_index + 1,
                        state.current_set
                    );
                    (state, LoadOutcome::Resumed)
                }
                Err(reason) => {
                    if reason == DiscardReason::Corrupt {
                        tracing::warn!("Session snapshot is corrupted. Starting fresh.");
                    } else {
                        tracing::info!("Discarding session snapshot ({:?})", reason);
                    }
                    (fresh, LoadOutcome::Discarded(reason))
                }
            },
        };

        let mut engine = Self {
            store,
            clock,
            timing,
            workout,
            state,
            active: false,
            load_outcome,
            persistence_degraded: false,
            write_failed: false,
        };
        engine.persist();
        Ok(engine)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Read-only snapshot of the current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn workout(&self) -> &Workout {
        &self.workout
    }

    pub fn timing(&self) -> IntervalTiming {
        self.timing
    }

    pub fn current_exercise(&self) -> &Exercise {
        &self.workout.exercises[self.state.current_exercise_index]
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_complete(&self) -> bool {
        self.state.completed
    }

    pub fn load_outcome(&self) -> LoadOutcome {
        self.load_outcome
    }

    /// Whether the last write to the store failed
    ///
    /// In-memory state stays authoritative; only a restart would lose progress.
    pub fn persistence_degraded(&self) -> bool {
        self.persistence_degraded
    }

    /// Whether any write failed since this engine was created, even if a
    /// later one succeeded
    pub fn had_write_failure(&self) -> bool {
        self.write_failed
    }

    /// `current_exercise_index / total_exercises`
    pub fn progress_fraction(&self) -> f64 {
        self.state.progress_fraction(self.workout.exercises.len())
    }

    /// 0.0 .. 1.0 of the current interval already elapsed
    pub fn phase_elapsed_fraction(&self) -> f64 {
        let total = self.timing.duration_of(self.state.phase);
        if total == 0 || self.state.remaining_seconds >= total {
            return 0.0;
        }
        (total - self.state.remaining_seconds) as f64 / total as f64
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Apply one elapsed second; ignored while paused or complete
    pub fn tick(&mut self) -> Step {
        if self.state.completed || !self.active {
            return self.step(None);
        }

        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
        let transition = if self.state.remaining_seconds == 0 {
            Some(self.cross_boundary())
        } else {
            None
        };
        self.commit(transition)
    }

    /// End the current interval now, exactly as if it had run out
    pub fn skip(&mut self) -> Step {
        if self.state.completed {
            return self.step(None);
        }

        self.state.remaining_seconds = 0;
        let transition = self.cross_boundary();
        tracing::debug!("Skipped to {:?}", transition);
        self.commit(Some(transition))
    }

    /// Add time to the current interval without changing phase
    pub fn extend(&mut self, seconds: u32) -> SessionState {
        if !self.state.completed {
            self.state.remaining_seconds = self.state.remaining_seconds.saturating_add(seconds);
            self.persist();
        }
        self.state.clone()
    }

    /// Start or pause ticking
    ///
    /// Resuming an interval that already ran down to zero re-arms it to the
    /// phase's full duration.
    pub fn set_active(&mut self, active: bool) {
        if self.state.completed {
            self.active = false;
            return;
        }
        if active == self.active {
            return;
        }

        if active && self.state.remaining_seconds == 0 {
            self.state.remaining_seconds = self.timing.duration_of(self.state.phase);
        }
        self.active = active;
        self.persist();
    }

    /// Explicitly write the current snapshot
    pub fn save(&mut self) {
        self.persist();
    }

    /// Remove the stored snapshot; safe to call more than once
    pub fn discard_snapshot(&mut self) {
        if let Err(e) = clear_snapshot(self.store.as_ref()) {
            tracing::warn!("Failed to clear session snapshot: {}", e);
            self.persistence_degraded = true;
            self.write_failed = true;
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Move past an interval that reached zero
    fn cross_boundary(&mut self) -> Transition {
        match self.state.phase {
            Phase::Work => {
                let sets = self.current_exercise().sets;
                if self.state.current_set < sets {
                    self.state.current_set += 1;
                    self.enter_rest();
                    Transition::EnteredRest {
                        next_exercise: false,
                    }
                } else if self.state.current_exercise_index + 1 < self.workout.exercises.len() {
                    self.state.current_exercise_index += 1;
                    self.state.current_set = 1;
                    self.enter_rest();
                    Transition::EnteredRest {
                        next_exercise: true,
                    }
                } else {
                    self.state.completed = true;
                    self.state.remaining_seconds = 0;
                    self.active = false;
                    tracing::info!("Workout {} complete", self.state.workout_type);
                    Transition::Completed
                }
            }
            Phase::Rest => {
                self.state.phase = Phase::Work;
                self.state.remaining_seconds = self.timing.work_seconds;
                Transition::EnteredWork
            }
        }
    }

    fn enter_rest(&mut self) {
        self.state.phase = Phase::Rest;
        self.state.remaining_seconds = self.timing.rest_seconds;
    }

    fn commit(&mut self, transition: Option<Transition>) -> Step {
        if transition == Some(Transition::Completed) {
            self.state.last_updated_timestamp = self.clock.now();
            self.discard_snapshot();
        } else {
            self.persist();
        }
        self.step(transition)
    }

    fn step(&self, transition: Option<Transition>) -> Step {
        Step {
            state: self.state.clone(),
            transition,
        }
    }

    fn persist(&mut self) {
        self.state.last_updated_timestamp = self.clock.now();
        let result = serde_json::to_string(&self.state)
            .map_err(Error::from)
            .and_then(|contents| self.store.set(SESSION_KEY, &contents));

        match result {
            Ok(()) => {
                if self.persistence_degraded {
                    tracing::info!("Session snapshot writes recovered");
                }
                self.persistence_degraded = false;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to save session snapshot: {}. Continuing in memory.",
                    e
                );
                self.persistence_degraded = true;
                self.write_failed = true;
            }
        }
    }
}

fn parse_snapshot(raw: &str) -> std::result::Result<SessionState, DiscardReason> {
    serde_json::from_str(raw).map_err(|e| {
        tracing::debug!("Snapshot parse error: {}", e);
        DiscardReason::Corrupt
    })
}

/// Parse a stored snapshot and decide whether it can be resumed
fn check_snapshot(
    raw: &str,
    workout_type: &str,
    workout: &Workout,
    now: DateTime<Utc>,
) -> std::result::Result<SessionState, DiscardReason> {
    let state = parse_snapshot(raw)?;

    if state.completed {
        return Err(DiscardReason::Completed);
    }
    if state.workout_type != workout_type {
        return Err(DiscardReason::WrongWorkout);
    }
    if !same_local_day(state.last_updated_timestamp, now) {
        return Err(DiscardReason::PreviousDay);
    }

    let exercise = workout
        .exercises
        .get(state.current_exercise_index)
        .ok_or(DiscardReason::OutOfRange)?;
    if state.current_set == 0 || state.current_set > exercise.sets {
        return Err(DiscardReason::OutOfRange);
    }

    Ok(state)
}

/// Today's unfinished snapshot of any workout, if `load_or_init` would resume it
pub fn resumable_snapshot(
    store: &dyn KeyValueStore,
    catalog: &Catalog,
    now: DateTime<Utc>,
) -> Option<SessionState> {
    let raw = match store.get(SESSION_KEY) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!("Unable to read session snapshot: {}", e);
            return None;
        }
    };

    let workout_type = parse_snapshot(&raw).ok()?.workout_type;
    let workout = catalog.get(&workout_type)?;
    check_snapshot(&raw, &workout_type, workout, now).ok()
}

/// Delete the session snapshot
pub fn clear_snapshot(store: &dyn KeyValueStore) -> Result<()> {
    store.remove(SESSION_KEY)
}
