//! Local wall-clock time, day boundaries and the midnight countdown.
//!
//! Every "today" and "midnight" in the engine is derived from a single
//! [`Clock`] so day rollovers can be simulated deterministically.

use std::cell::Cell;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeDelta, Utc};
use serde::Serialize;

use crate::constants::SECONDS_PER_DAY;

/// Source of local wall-clock time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// Reads the host's local time zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Cell<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    /// Clock pinned to `hour:00:00` on the given date.
    pub fn at(date: NaiveDate, hour: u32) -> Self {
        let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        Self::new(date.and_time(time))
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }

    pub fn advance(&self, by: TimeDelta) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(TimeDelta::days(days));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

/// First instant of the local day after `now`.
pub fn next_midnight(now: NaiveDateTime) -> NaiveDateTime {
    now.date()
        .succ_opt()
        .map(|d| d.and_time(NaiveTime::MIN))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Time left until the daily gate reopens, in whole units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Countdown {
    pub fn from_seconds(total: i64) -> Self {
        let total = total.clamp(0, SECONDS_PER_DAY - 1) as u32;
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    pub fn total_seconds(&self) -> u32 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Floored countdown from `now` to the next local midnight.
///
/// Clamped into `[00:00:00, 23:59:59]`: the tick landing exactly on midnight
/// reports `23:59:59`, never `24:00:00` or a negative component.
pub fn countdown(now: NaiveDateTime) -> Countdown {
    Countdown::from_seconds((next_midnight(now) - now).num_seconds())
}

/// Current UTC timestamp in ISO-8601 format.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse `YYYY-MM-DDTHH:MM:SS` or a bare `YYYY-MM-DD` (midnight) as local time.
pub fn parse_local(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        parse_local(s).unwrap()
    }

    #[test]
    fn test_next_midnight() {
        assert_eq!(
            next_midnight(dt("2026-03-01T15:30:00")),
            dt("2026-03-02T00:00:00")
        );
        assert_eq!(
            next_midnight(dt("2026-12-31T23:59:59")),
            dt("2027-01-01T00:00:00")
        );
    }

    #[test]
    fn test_countdown_midday() {
        let c = countdown(dt("2026-03-01T12:00:00"));
        assert_eq!(c, Countdown { hours: 12, minutes: 0, seconds: 0 });
    }

    #[test]
    fn test_countdown_floors_subseconds() {
        let now = dt("2026-03-01T23:59:58") + TimeDelta::milliseconds(400);
        let c = countdown(now);
        assert_eq!(c, Countdown { hours: 0, minutes: 0, seconds: 1 });
    }

    #[test]
    fn test_countdown_last_second() {
        let c = countdown(dt("2026-03-01T23:59:59"));
        assert_eq!(c, Countdown { hours: 0, minutes: 0, seconds: 1 });
    }

    #[test]
    fn test_countdown_exact_midnight_is_clamped() {
        let c = countdown(dt("2026-03-02T00:00:00"));
        assert_eq!(c, Countdown { hours: 23, minutes: 59, seconds: 59 });
    }

    #[test]
    fn test_countdown_from_negative_is_zero() {
        assert_eq!(Countdown::from_seconds(-5), Countdown::default());
    }

    #[test]
    fn test_fixed_clock_advance() {
        let clock = FixedClock::at(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), 23);
        clock.advance(TimeDelta::hours(2));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn test_parse_local_date_only() {
        assert_eq!(parse_local("2026-03-01"), Some(dt("2026-03-01T00:00:00")));
        assert!(parse_local("yesterday").is_none());
    }

    #[test]
    fn test_now_is_recent() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"), "timestamp should be this century: {ts}");
        assert!(ts.ends_with('Z'));
    }
}
