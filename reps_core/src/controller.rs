//! Session controller: serializes intents and rewards completion.
//!
//! Ticks and user intents arrive through one mailbox and are applied one at
//! a time, so no two transitions ever overlap on the same session. The
//! moment the engine reports completion the controller records it with the
//! progression engine, exactly once per controller instance.

use crate::session::{SessionEngine, Transition};
use crate::{Award, ProgressionEngine, SessionState};
use std::sync::mpsc::Receiver;

/// Something that can happen to a running session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    /// One second of wall-clock time elapsed
    Tick,
    Start,
    Pause,
    /// Start when paused, pause when running
    Toggle,
    Skip,
    Extend,
    /// Pause, save and leave the run loop
    Quit,
}

/// What one intent did
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub intent: Intent,
    pub state: SessionState,
    pub active: bool,
    pub transition: Option<Transition>,
    /// Present only on the intent that completed the workout
    pub award: Option<Award>,
}

pub struct SessionController {
    engine: SessionEngine,
    progression: ProgressionEngine,
    extend_seconds: u32,
    completion_recorded: bool,
}

impl SessionController {
    pub fn new(engine: SessionEngine, progression: ProgressionEngine, extend_seconds: u32) -> Self {
        Self {
            engine,
            progression,
            extend_seconds,
            completion_recorded: false,
        }
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub fn progression(&self) -> &ProgressionEngine {
        &self.progression
    }

    /// Apply a single intent as one discrete transition
    pub fn handle(&mut self, intent: Intent) -> Outcome {
        let transition = match intent {
            Intent::Tick => self.engine.tick().transition,
            Intent::Start => {
                self.engine.set_active(true);
                None
            }
            Intent::Pause | Intent::Quit => {
                self.engine.set_active(false);
                None
            }
            Intent::Toggle => {
                let active = !self.engine.is_active();
                self.engine.set_active(active);
                None
            }
            Intent::Skip => self.engine.skip().transition,
            Intent::Extend => {
                self.engine.extend(self.extend_seconds);
                None
            }
        };

        let award = self.observe_completion();
        Outcome {
            intent,
            state: self.engine.state().clone(),
            active: self.engine.is_active(),
            transition,
            award,
        }
    }

    /// Record a completed workout with the progression engine
    ///
    /// Safe to call any number of times: only the first call after the
    /// engine completes does anything.
    pub fn observe_completion(&mut self) -> Option<Award> {
        if !self.engine.is_complete() || self.completion_recorded {
            return None;
        }
        self.completion_recorded = true;
        self.engine.discard_snapshot();

        let workout_type = self.engine.state().workout_type.clone();
        match self.progression.record_completion(&workout_type) {
            Ok(award) => Some(award),
            Err(e) => {
                tracing::error!("Failed to record completion of {}: {}", workout_type, e);
                None
            }
        }
    }

    /// Drain the mailbox until the workout completes, `Quit` arrives, or
    /// every sender is gone
    ///
    /// `observer` sees every outcome in order. Returns the completion award
    /// if the workout finished during this run.
    pub fn run<F>(&mut self, mailbox: &Receiver<Intent>, mut observer: F) -> Option<Award>
    where
        F: FnMut(&SessionController, &Outcome),
    {
        let mut award = None;

        while let Ok(intent) = mailbox.recv() {
            let outcome = self.handle(intent);
            observer(&*self, &outcome);
            if outcome.award.is_some() {
                award = outcome.award;
            }
            if intent == Intent::Quit || self.engine.is_complete() {
                return award;
            }
        }

        // All senders gone: leave the session paused and saved
        self.engine.set_active(false);
        award
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore, SESSION_KEY};
    use crate::{Catalog, Exercise, IntervalTiming, ManualClock, Phase, Workout};
    use chrono::{Local, TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::mpsc;
    use std::sync::Arc;

    fn catalog() -> Catalog {
        let mut workouts = BTreeMap::new();
        workouts.insert(
            "pair".to_string(),
            Workout {
                title: "Pair".into(),
                exercises: vec![
                    Exercise {
                        id: "a".into(),
                        name: "A".into(),
                        sets: 1,
                        reps: "Max reps".into(),
                        weight: None,
                    },
                    Exercise {
                        id: "b".into(),
                        name: "B".into(),
                        sets: 1,
                        reps: "10 reps".into(),
                        weight: Some("20 lbs".into()),
                    },
                ],
            },
        );
        Catalog { workouts }
    }

    fn controller(store: Arc<MemoryStore>) -> SessionController {
        let clock = Arc::new(ManualClock::new(
            Local
                .with_ymd_and_hms(2024, 3, 14, 12, 0, 0)
                .single()
                .unwrap()
                .with_timezone(&Utc),
        ));
        let timing = IntervalTiming {
            work_seconds: 3,
            rest_seconds: 2,
        };
        let engine =
            SessionEngine::load_or_init(store.clone(), clock.clone(), timing, "pair", &catalog())
                .unwrap();
        SessionController::new(engine, ProgressionEngine::new(store, clock), 30)
    }

    #[test]
    fn test_intents_map_to_engine() {
        let mut ctl = controller(Arc::new(MemoryStore::new()));

        assert!(ctl.handle(Intent::Start).active);
        assert_eq!(ctl.handle(Intent::Tick).state.remaining_seconds, 2);
        assert_eq!(ctl.handle(Intent::Extend).state.remaining_seconds, 32);
        assert!(!ctl.handle(Intent::Toggle).active);
        assert!(ctl.handle(Intent::Toggle).active);
        assert!(!ctl.handle(Intent::Pause).active);

        let skipped = ctl.handle(Intent::Skip);
        assert_eq!(
            skipped.transition,
            Some(Transition::EnteredRest {
                next_exercise: true
            })
        );
        assert_eq!(skipped.state.phase, Phase::Rest);
        assert_eq!(skipped.state.remaining_seconds, 2);
    }

    #[test]
    fn test_completion_rewarded_once() {
        let store = Arc::new(MemoryStore::new());
        let mut ctl = controller(store.clone());

        ctl.handle(Intent::Skip); // a -> rest
        ctl.handle(Intent::Skip); // rest -> work on b
        let done = ctl.handle(Intent::Skip);

        assert_eq!(done.transition, Some(Transition::Completed));
        let award = done.award.expect("completion should be rewarded");
        assert_eq!(award.state.xp, 50);
        assert_eq!(award.state.completed_workouts["pair"], 1);

        // Observing the completed state again does not reward again
        assert_eq!(ctl.observe_completion(), None);
        assert_eq!(ctl.handle(Intent::Tick).award, None);
        assert_eq!(ctl.handle(Intent::Skip).award, None);
        assert_eq!(ctl.observe_completion(), None);

        let progression = ctl.progression().get_progression();
        assert_eq!(progression.xp, 50);
        assert_eq!(progression.completed_workouts["pair"], 1);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
    }

    #[test]
    fn test_failed_completion_record_not_retried() {
        let session_store = Arc::new(MemoryStore::new());
        let progression_store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = SessionEngine::load_or_init(
            session_store.clone(),
            clock.clone(),
            IntervalTiming::default(),
            "pair",
            &catalog(),
        )
        .unwrap();
        let progression = ProgressionEngine::new(progression_store.clone(), clock);
        let mut ctl = SessionController::new(engine, progression, 30);

        progression_store.set_fail_writes(true);
        ctl.handle(Intent::Skip);
        ctl.handle(Intent::Skip);
        let done = ctl.handle(Intent::Skip);

        assert_eq!(done.transition, Some(Transition::Completed));
        assert_eq!(done.award, None);
        assert_eq!(session_store.get(SESSION_KEY).unwrap(), None);

        // Storage recovers, but the completion was already consumed
        progression_store.set_fail_writes(false);
        assert_eq!(ctl.observe_completion(), None);
        assert_eq!(ctl.progression().get_progression().xp, 0);
        assert!(ctl.progression().get_progression().completed_workouts.is_empty());
    }

    #[test]
    fn test_run_until_complete() {
        let mut ctl = controller(Arc::new(MemoryStore::new()));
        let (tx, rx) = mpsc::channel();

        tx.send(Intent::Start).unwrap();
        // 3s work, 2s rest, 3s work
        for _ in 0..8 {
            tx.send(Intent::Tick).unwrap();
        }
        // Never reached: the loop stops at completion
        tx.send(Intent::Extend).unwrap();

        let mut seen = Vec::new();
        let award = ctl.run(&rx, |_, outcome| seen.push(outcome.intent));

        assert!(award.is_some());
        assert_eq!(seen.len(), 9);
        assert!(ctl.engine().is_complete());
        assert_eq!(rx.try_recv(), Ok(Intent::Extend));
    }

    #[test]
    fn test_run_quit_keeps_progress() {
        let store = Arc::new(MemoryStore::new());
        let mut ctl = controller(store.clone());
        let (tx, rx) = mpsc::channel();

        tx.send(Intent::Start).unwrap();
        tx.send(Intent::Tick).unwrap();
        tx.send(Intent::Quit).unwrap();

        assert_eq!(ctl.run(&rx, |_, _| {}), None);
        assert!(!ctl.engine().is_active());

        let saved: SessionState =
            serde_json::from_str(&store.get(SESSION_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(saved.remaining_seconds, 2);
        assert_eq!(ctl.progression().get_progression().xp, 0);
    }

    #[test]
    fn test_run_ends_when_senders_drop() {
        let mut ctl = controller(Arc::new(MemoryStore::new()));
        let (tx, rx) = mpsc::channel();
        tx.send(Intent::Start).unwrap();
        drop(tx);

        assert_eq!(ctl.run(&rx, |_, _| {}), None);
        assert!(!ctl.engine().is_active());
    }
}
