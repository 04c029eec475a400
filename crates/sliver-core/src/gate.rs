//! Daily gate: decides whether the reader may move forward and reports
//! milestone transitions.
//!
//! Phases move `Idle -> Reading -> GateClosed -> Reading (next day) -> ...`
//! and end in `Freedom`, which only an explicit reset leaves. The phase is
//! never stored; it is re-derived from the engine after every mutation and
//! on every [`ReaderController::tick`].

use serde::Serialize;

use crate::engine::HabitEngine;
use crate::error::Result;
use crate::event::{EventKind, EventSink, Milestone};
use crate::repository::HabitRepository;
use crate::time::{Clock, Countdown};
use crate::view::DerivedView;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Reading,
    GateClosed,
    Freedom,
}

impl Phase {
    pub fn from_view(view: Option<&DerivedView>) -> Self {
        match view {
            None => Phase::Idle,
            Some(v) if v.is_freedom_mode => Phase::Freedom,
            Some(v) if !v.can_read_more => Phase::GateClosed,
            Some(_) => Phase::Reading,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Reading => "reading",
            Phase::GateClosed => "gate closed",
            Phase::Freedom => "freedom",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The page was turned and counted as read.
    Advanced {
        page: u32,
        pages_read_today: u32,
        goal_reached: bool,
        freedom_reached: bool,
    },
    /// Today's goal is met; forward reading is refused until midnight.
    GateClosed,
    EndOfBook,
    NoActiveHabit,
}

/// Result of a move that does not count as reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavOutcome {
    Moved(u32),
    /// A forward jump while today's goal is met. The reader stays on `page`.
    GateClosed { page: u32 },
    NoActiveHabit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    pub countdown: Countdown,
    pub phase: Phase,
    pub change: Option<PhaseChange>,
}

pub struct ReaderController<R, C, S> {
    engine: HabitEngine<R, C>,
    sink: S,
    book_title: String,
    phase: Phase,
}

impl<R: HabitRepository, C: Clock, S: EventSink> ReaderController<R, C, S> {
    pub fn new(engine: HabitEngine<R, C>, sink: S, book_title: &str) -> Self {
        let phase = Phase::from_view(engine.view().as_ref());
        Self {
            engine,
            sink,
            book_title: book_title.to_string(),
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn book_title(&self) -> &str {
        &self.book_title
    }

    pub fn engine(&self) -> &HabitEngine<R, C> {
        &self.engine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_engine(self) -> HabitEngine<R, C> {
        self.engine
    }

    pub fn view(&self) -> Option<DerivedView> {
        self.engine.view()
    }

    /// Start (or restart) a habit for the loaded document.
    pub fn start(&mut self, daily_goal: u32, total_pages: u32) -> Result<()> {
        let result = self.engine.initialize(daily_goal, total_pages).map(|_| ());
        self.refresh();
        result
    }

    /// Advance one page if the gate allows it, counting the page as read.
    pub fn turn_forward(&mut self) -> Result<TurnOutcome> {
        let Some(view) = self.engine.view() else {
            return Ok(TurnOutcome::NoActiveHabit);
        };
        if !view.can_read_more {
            self.refresh();
            return Ok(TurnOutcome::GateClosed);
        }
        if view.current_page >= view.total_pages {
            return Ok(TurnOutcome::EndOfBook);
        }

        let page = view.current_page + 1;
        let Some(outcome) = self.engine.apply_read(page)? else {
            return Ok(TurnOutcome::NoActiveHabit);
        };

        // Milestones follow the in-memory transition, even if the write fails.
        if outcome.goal_reached {
            self.sink
                .emit(&Milestone::new(&self.book_title, EventKind::DailyGoalReached));
        }
        if outcome.freedom_reached {
            self.sink
                .emit(&Milestone::new(&self.book_title, EventKind::FreedomStageReached));
        }
        self.refresh();
        self.engine.save()?;

        Ok(TurnOutcome::Advanced {
            page,
            pages_read_today: outcome.pages_read_today,
            goal_reached: outcome.goal_reached,
            freedom_reached: outcome.freedom_reached,
        })
    }

    /// Go back one page. Always permitted; never counts as progress.
    pub fn turn_back(&mut self) -> Result<NavOutcome> {
        let Some(current) = self.engine.state().map(|s| s.current_page) else {
            return Ok(NavOutcome::NoActiveHabit);
        };
        self.jump_to(i64::from(current) - 1)
    }

    /// Jump within the document without counting progress. Backward jumps
    /// are always allowed; forward ones are refused while the gate is closed.
    pub fn jump_to(&mut self, page: i64) -> Result<NavOutcome> {
        self.refresh();
        let Some(state) = self.engine.state() else {
            return Ok(NavOutcome::NoActiveHabit);
        };
        let current = state.current_page;
        let target = page.clamp(1, i64::from(state.total_pages.max(1)));
        if self.phase == Phase::GateClosed && target > i64::from(current) {
            return Ok(NavOutcome::GateClosed { page: current });
        }

        let moved = self.engine.navigate_to(page)?.map(|s| s.current_page);
        self.refresh();
        Ok(moved.map_or(NavOutcome::NoActiveHabit, NavOutcome::Moved))
    }

    pub fn update_total_pages(&mut self, total_pages: u32) -> Result<()> {
        self.engine.update_total_pages(total_pages)?;
        self.refresh();
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        let result = self.engine.reset();
        self.refresh();
        result
    }

    /// Periodic re-evaluation; picks up the midnight rollover.
    pub fn tick(&mut self) -> Tick {
        let change = self.refresh();
        Tick {
            countdown: self.engine.countdown(),
            phase: self.phase,
            change,
        }
    }

    fn refresh(&mut self) -> Option<PhaseChange> {
        let next = Phase::from_view(self.engine.view().as_ref());
        if next == self.phase {
            return None;
        }
        let change = PhaseChange {
            from: self.phase,
            to: next,
        };
        self.phase = next;
        Some(change)
    }
}
