use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::HABIT_DAYS;
use crate::error::{HabitError, Result};

/// The persisted habit record for the active document.
///
/// Freedom mode is not stored: it is always `days_completed.len() >= HABIT_DAYS`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitState {
    pub start_date: NaiveDate,
    pub daily_goal: u32,
    pub total_pages: u32,
    pub current_page: u32,
    /// Append-only; each date appears at most once.
    pub days_completed: Vec<NaiveDate>,
    pub pages_read_by_date: BTreeMap<NaiveDate, u32>,
    #[serde(default)]
    pub last_read_date: Option<NaiveDate>,
}

/// What a single recorded read changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    pub pages_read_today: u32,
    /// Today was appended to `days_completed` by this read.
    pub goal_reached: bool,
    /// This read brought the completed-day count to `HABIT_DAYS`.
    pub freedom_reached: bool,
}

impl HabitState {
    pub fn new(daily_goal: u32, total_pages: u32, today: NaiveDate) -> Result<Self> {
        if daily_goal == 0 {
            return Err(HabitError::InvalidInput(
                "daily goal must be positive".to_string(),
            ));
        }
        if total_pages == 0 {
            return Err(HabitError::InvalidInput(
                "total pages must be positive".to_string(),
            ));
        }
        Ok(Self {
            start_date: today,
            daily_goal,
            total_pages,
            current_page: 1,
            days_completed: Vec::new(),
            pages_read_by_date: BTreeMap::new(),
            last_read_date: None,
        })
    }

    pub fn total_days_completed(&self) -> usize {
        self.days_completed.len()
    }

    pub fn is_freedom_mode(&self) -> bool {
        self.total_days_completed() >= HABIT_DAYS
    }

    pub fn pages_read_on(&self, date: NaiveDate) -> u32 {
        self.pages_read_by_date.get(&date).copied().unwrap_or(0)
    }

    pub fn completed_on(&self, date: NaiveDate) -> bool {
        self.days_completed.contains(&date)
    }

    /// Record `page` as read today.
    ///
    /// The completed-day append happens at most once per date, on the read
    /// that first brings the day's count to the goal.
    pub fn record_read(&mut self, page: u32, today: NaiveDate) -> Result<ReadOutcome> {
        if page == 0 || page > self.total_pages {
            return Err(HabitError::InvalidInput(format!(
                "page {page} outside 1..={}",
                self.total_pages
            )));
        }

        let was_free = self.is_freedom_mode();

        self.current_page = page;
        self.last_read_date = Some(today);
        let count = self.pages_read_by_date.entry(today).or_insert(0);
        *count += 1;
        let pages_read_today = *count;

        let goal_reached = pages_read_today >= self.daily_goal && !self.completed_on(today);
        if goal_reached {
            self.days_completed.push(today);
        }

        Ok(ReadOutcome {
            pages_read_today,
            goal_reached,
            freedom_reached: !was_free && self.is_freedom_mode(),
        })
    }

    /// Move to `page` without counting it as progress. Out-of-range input is clamped.
    pub fn navigate_to(&mut self, page: i64) {
        let clamped = page.clamp(1, i64::from(self.total_pages));
        self.current_page = clamped as u32;
    }

    /// Correct the page count once document metadata is known.
    /// `current_page` is left as is.
    pub fn set_total_pages(&mut self, total_pages: u32) -> Result<()> {
        if total_pages == 0 {
            return Err(HabitError::InvalidInput(
                "total pages must be positive".to_string(),
            ));
        }
        self.total_pages = total_pages;
        Ok(())
    }

    /// Days needed to finish the document at the daily goal.
    pub fn estimated_days_to_finish(&self) -> u32 {
        self.total_pages.div_ceil(self.daily_goal)
    }
}

/// Serialize a habit record to its JSON storage form.
pub fn export_json(state: &HabitState) -> serde_json::Result<String> {
    serde_json::to_string(state)
}

/// Parse a habit record from its JSON storage form.
pub fn import_json(json: &str) -> serde_json::Result<HabitState> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, n).unwrap()
    }

    #[test]
    fn test_new_rejects_zero_goal() {
        assert!(matches!(
            HabitState::new(0, 10, day(1)),
            Err(HabitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_rejects_zero_pages() {
        assert!(matches!(
            HabitState::new(5, 0, day(1)),
            Err(HabitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_state_defaults() {
        let s = HabitState::new(5, 40, day(1)).unwrap();
        assert_eq!(s.start_date, day(1));
        assert_eq!(s.current_page, 1);
        assert!(s.days_completed.is_empty());
        assert!(s.pages_read_by_date.is_empty());
        assert!(s.last_read_date.is_none());
    }

    #[test]
    fn test_record_read_counts_and_moves() {
        let mut s = HabitState::new(5, 40, day(1)).unwrap();
        let out = s.record_read(2, day(1)).unwrap();
        assert_eq!(out.pages_read_today, 1);
        assert!(!out.goal_reached);
        assert_eq!(s.current_page, 2);
        assert_eq!(s.last_read_date, Some(day(1)));
    }

    #[test]
    fn test_goal_appends_once() {
        let mut s = HabitState::new(2, 40, day(1)).unwrap();
        s.record_read(2, day(1)).unwrap();
        let second = s.record_read(3, day(1)).unwrap();
        assert!(second.goal_reached);
        let third = s.record_read(4, day(1)).unwrap();
        assert!(!third.goal_reached);
        assert_eq!(s.days_completed, vec![day(1)]);
        assert_eq!(s.pages_read_on(day(1)), 3);
    }

    #[test]
    fn test_record_read_rejects_out_of_range() {
        let mut s = HabitState::new(2, 10, day(1)).unwrap();
        let before = s.clone();
        assert!(s.record_read(0, day(1)).is_err());
        assert!(s.record_read(11, day(1)).is_err());
        assert_eq!(s, before);
    }

    #[test]
    fn test_freedom_reached_fires_on_twenty_first_day_only() {
        let mut s = HabitState::new(1, 100, day(1)).unwrap();
        for d in 1..=20 {
            let out = s.record_read(d + 1, day(d)).unwrap();
            assert!(!out.freedom_reached);
        }
        let out = s.record_read(22, day(21)).unwrap();
        assert!(out.freedom_reached);
        let again = s.record_read(23, day(22)).unwrap();
        assert!(!again.freedom_reached);
        assert!(s.is_freedom_mode());
    }

    #[test]
    fn test_navigate_clamps() {
        let mut s = HabitState::new(5, 100, day(1)).unwrap();
        s.navigate_to(0);
        assert_eq!(s.current_page, 1);
        s.navigate_to(500);
        assert_eq!(s.current_page, 100);
        s.navigate_to(-3);
        assert_eq!(s.current_page, 1);
        s.navigate_to(42);
        assert_eq!(s.current_page, 42);
        assert!(s.pages_read_by_date.is_empty());
    }

    #[test]
    fn test_set_total_pages_keeps_current_page() {
        let mut s = HabitState::new(5, 100, day(1)).unwrap();
        s.navigate_to(80);
        s.set_total_pages(50).unwrap();
        assert_eq!(s.total_pages, 50);
        assert_eq!(s.current_page, 80);
        assert!(s.set_total_pages(0).is_err());
        assert_eq!(s.total_pages, 50);
    }

    #[test]
    fn test_estimated_days_rounds_up() {
        let s = HabitState::new(3, 10, day(1)).unwrap();
        assert_eq!(s.estimated_days_to_finish(), 4);
    }

    #[test]
    fn test_json_field_names() {
        let mut s = HabitState::new(3, 10, day(1)).unwrap();
        s.record_read(2, day(1)).unwrap();
        let json = export_json(&s).unwrap();
        assert!(json.contains("\"dailyGoal\":3"));
        assert!(json.contains("\"pagesReadByDate\":{\"2026-03-01\":1}"));
        assert!(json.contains("\"lastReadDate\":\"2026-03-01\""));
        assert_eq!(import_json(&json).unwrap(), s);
    }

    #[test]
    fn test_import_without_last_read_date() {
        let json = r#"{"startDate":"2026-03-01","dailyGoal":5,"totalPages":40,
            "currentPage":1,"daysCompleted":[],"pagesReadByDate":{}}"#;
        let s = import_json(json).unwrap();
        assert!(s.last_read_date.is_none());
    }
}
