use chrono::NaiveDateTime;

use crate::error::Result;
use crate::habit::{HabitState, ReadOutcome};
use crate::repository::HabitRepository;
use crate::time::{Clock, Countdown, countdown};
use crate::view::{DerivedView, derive_view};

/// Owner of the active habit state.
///
/// All mutations change the in-memory state first and then write it through
/// the repository. A failed write is reported as `HabitError::Persistence`,
/// but the in-memory state keeps the change so the session stays usable.
pub struct HabitEngine<R, C> {
    repo: R,
    clock: C,
    state: Option<HabitState>,
}

impl<R: HabitRepository, C: Clock> HabitEngine<R, C> {
    /// Load whatever habit record the repository holds.
    pub fn load(repo: R, clock: C) -> Result<Self> {
        let state = repo.load()?;
        Ok(Self { repo, clock, state })
    }

    pub fn state(&self) -> Option<&HabitState> {
        self.state.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Start a fresh habit, replacing any previous record.
    pub fn initialize(&mut self, daily_goal: u32, total_pages: u32) -> Result<&HabitState> {
        let fresh = HabitState::new(daily_goal, total_pages, self.clock.today())?;
        let saved = self.repo.save(&fresh);
        let state = self.state.insert(fresh);
        saved?;
        Ok(&*state)
    }

    /// Count `page` as read today. `Ok(None)` when no habit is active.
    pub fn record_page_read(&mut self, page: u32) -> Result<Option<ReadOutcome>> {
        let outcome = self.apply_read(page)?;
        if outcome.is_some() {
            self.save()?;
        }
        Ok(outcome)
    }

    /// The in-memory half of [`record_page_read`](Self::record_page_read).
    /// The clock is read once, so the outcome always describes the date the
    /// read was filed under. Follow with [`save`](Self::save).
    pub fn apply_read(&mut self, page: u32) -> Result<Option<ReadOutcome>> {
        let today = self.clock.today();
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        state.record_read(page, today).map(Some)
    }

    /// Write the current state through the repository. No-op without a habit.
    pub fn save(&self) -> Result<()> {
        if let Some(state) = &self.state {
            self.repo.save(state)?;
        }
        Ok(())
    }

    /// Move without counting progress; the page is clamped into range.
    pub fn navigate_to(&mut self, page: i64) -> Result<Option<&HabitState>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        state.navigate_to(page);
        self.repo.save(state)?;
        Ok(Some(&*state))
    }

    pub fn update_total_pages(&mut self, total_pages: u32) -> Result<Option<&HabitState>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        state.set_total_pages(total_pages)?;
        self.repo.save(state)?;
        Ok(Some(&*state))
    }

    /// Drop the habit record. Afterwards there is no active habit.
    pub fn reset(&mut self) -> Result<()> {
        self.state = None;
        self.repo.clear()?;
        Ok(())
    }

    pub fn view(&self) -> Option<DerivedView> {
        self.view_at(self.clock.now())
    }

    pub fn view_at(&self, now: NaiveDateTime) -> Option<DerivedView> {
        self.state.as_ref().map(|s| derive_view(s, now))
    }

    pub fn countdown(&self) -> Countdown {
        countdown(self.clock.now())
    }
}
