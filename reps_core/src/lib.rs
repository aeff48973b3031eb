#![forbid(unsafe_code)]

//! Core domain model and business logic for the Reps workout companion.
//!
//! This crate provides:
//! - Domain types (exercises, workouts, session snapshots, progression)
//! - Persistence port (key-value store) with memory and file backends
//! - Session engine (work/rest interval state machine)
//! - Progression engine (experience points and levels)
//! - Session controller and real-time tick source
//! - Catalog, configuration and logging

pub mod types;
pub mod error;
pub mod clock;
pub mod store;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod session;
pub mod progression;
pub mod controller;
pub mod ticker;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use store::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use catalog::{get_default_catalog, ExerciseEdit};
pub use config::Config;
pub use session::{DiscardReason, LoadOutcome, SessionEngine, Step, Transition};
pub use progression::{is_recent_level_up, Award, ProgressionEngine};
pub use controller::{Intent, Outcome, SessionController};
pub use ticker::Ticker;
