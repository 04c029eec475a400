use chrono::NaiveDateTime;
use serde::Serialize;

use crate::constants::HABIT_DAYS;
use crate::habit::HabitState;

/// Read-only projection of a habit state at a given instant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DerivedView {
    pub total_days_completed: usize,
    pub is_freedom_mode: bool,
    pub pages_read_today: u32,
    pub daily_goal: u32,
    pub daily_goal_reached_today: bool,
    pub can_read_more: bool,
    pub daily_progress_percent: f64,
    pub habit_progress_percent: f64,
    pub current_day: usize,
    pub current_page: u32,
    pub total_pages: u32,
    pub is_book_complete: bool,
}

/// Project `state` at `now` (local time). No side effects, no caching.
pub fn derive_view(state: &HabitState, now: NaiveDateTime) -> DerivedView {
    let today = now.date();
    let total_days_completed = state.total_days_completed();
    let is_freedom_mode = total_days_completed >= HABIT_DAYS;
    let pages_read_today = state.pages_read_on(today);
    let daily_goal_reached_today = pages_read_today >= state.daily_goal;
    let can_read_more = is_freedom_mode || !daily_goal_reached_today;

    // daily_goal is validated positive at construction
    let goal = f64::from(state.daily_goal.max(1));
    let daily_progress_percent = (100.0 * f64::from(pages_read_today) / goal).min(100.0);
    let habit_progress_percent = 100.0 * total_days_completed as f64 / HABIT_DAYS as f64;

    let current_day = if state.completed_on(today) {
        total_days_completed
    } else {
        total_days_completed + 1
    }
    .min(HABIT_DAYS);

    DerivedView {
        total_days_completed,
        is_freedom_mode,
        pages_read_today,
        daily_goal: state.daily_goal,
        daily_goal_reached_today,
        can_read_more,
        daily_progress_percent,
        habit_progress_percent,
        current_day,
        current_page: state.current_page,
        total_pages: state.total_pages,
        is_book_complete: state.current_page >= state.total_pages,
    }
}
