//! Sliver habit engine.
//!
//! A reader sets a daily page goal for one document. Once the day's goal is
//! met, forward reading is gated until local midnight; after 21 distinct
//! completed days the gate is lifted for good (freedom mode).
//!
//! No I/O here: persistence and event delivery are traits implemented elsewhere.

pub mod constants;
pub mod engine;
pub mod error;
pub mod event;
pub mod gate;
pub mod habit;
pub mod repository;
pub mod time;
pub mod view;

pub use constants::{DAILY_GOAL_OPTIONS, DEFAULT_DAILY_GOAL, HABIT_DAYS};
pub use engine::HabitEngine;
pub use error::{HabitError, PersistenceError, Result};
pub use event::{EventKind, EventSink, Milestone, NullSink, RecordingSink};
pub use gate::{NavOutcome, Phase, PhaseChange, ReaderController, Tick, TurnOutcome};
pub use habit::{HabitState, ReadOutcome, export_json, import_json};
pub use repository::{HabitRepository, MemoryRepository};
pub use time::{Clock, Countdown, FixedClock, SystemClock, countdown, now_iso8601, parse_local};
pub use view::{DerivedView, derive_view};
