//! Reader session wiring: store + clock + sink → controller, and the
//! one-second countdown loop.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use sliver_core::{
    Clock, Countdown, DerivedView, EventSink, HabitEngine, HabitError, HabitRepository, Phase,
    ReaderController,
};
use sliver_store::Store;
use tokio_util::sync::CancellationToken;

pub type Reader<'a, S> = ReaderController<&'a Store, &'a dyn Clock, &'a S>;

/// Build a controller over the stored habit, titled after the stored document.
pub fn open_reader<'a, S: EventSink>(
    store: &'a Store,
    clock: &'a dyn Clock,
    sink: &'a S,
) -> Result<Reader<'a, S>> {
    let engine = HabitEngine::load(store, clock)?;
    let title = store
        .document_meta()?
        .map(|m| m.name)
        .unwrap_or_else(|| "untitled".to_string());
    Ok(ReaderController::new(engine, sink, &title))
}

/// Split a habit result into "worked", "worked in memory only" and "refused".
///
/// Persistence failures are the only errors shown to the user, as a warning;
/// the session carries on with the in-memory state.
pub fn surface<T>(result: sliver_core::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(HabitError::Persistence(e)) => {
            tracing::warn!("{e}");
            eprintln!("warning: progress may not be saved ({e})");
            Ok(None)
        }
        Err(e @ HabitError::InvalidInput(_)) => Err(e.into()),
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub book_title: String,
    pub phase: Phase,
    pub countdown: Countdown,
    pub estimated_days_to_finish: u32,
    pub view: DerivedView,
}

impl StatusReport {
    pub fn build<R: HabitRepository, C: Clock, S: EventSink>(
        reader: &ReaderController<R, C, S>,
    ) -> Option<Self> {
        let view = reader.view()?;
        let state = reader.engine().state()?;
        Some(Self {
            book_title: reader.book_title().to_string(),
            phase: reader.phase(),
            countdown: reader.engine().countdown(),
            estimated_days_to_finish: state.estimated_days_to_finish(),
            view,
        })
    }

    pub fn render(&self, out: &mut impl Write) -> std::io::Result<()> {
        let v = &self.view;
        writeln!(out, "book:       {}", self.book_title)?;
        if v.is_freedom_mode {
            writeln!(out, "day:        freedom mode")?;
        } else {
            writeln!(out, "day:        {} of {}", v.current_day, sliver_core::HABIT_DAYS)?;
        }
        writeln!(
            out,
            "today:      {} / {} pages ({:.0}%)",
            v.pages_read_today, v.daily_goal, v.daily_progress_percent
        )?;
        writeln!(out, "page:       {} / {}", v.current_page, v.total_pages)?;
        writeln!(out, "gate:       {}", self.phase)?;
        writeln!(out, "resets in:  {}", self.countdown)?;
        writeln!(
            out,
            "streak:     {} days ({:.0}%)",
            v.total_days_completed, v.habit_progress_percent
        )?;
        writeln!(out, "finish in:  ~{} days", self.estimated_days_to_finish)?;
        if v.is_book_complete {
            writeln!(out, "book complete")?;
        }
        Ok(())
    }
}

/// Tick once a second until cancelled or `max_ticks` is reached.
/// The interval is dropped on return, so no timer outlives the session.
pub async fn watch<R: HabitRepository, C: Clock, S: EventSink>(
    reader: &mut ReaderController<R, C, S>,
    cancel: CancellationToken,
    max_ticks: Option<u64>,
    out: &mut impl Write,
) -> std::io::Result<u64> {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut ticks = 0;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let tick = reader.tick();
                if let Some(change) = tick.change {
                    writeln!(out, "{} -> {}", change.from, change.to)?;
                }
                writeln!(out, "resets in {} [{}]", tick.countdown, tick.phase)?;
                out.flush()?;
                ticks += 1;
                if max_ticks.is_some_and(|max| ticks >= max) {
                    break;
                }
            }
        }
    }
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sliver_core::{FixedClock, RecordingSink};

    fn pdf() -> Vec<u8> {
        b"%PDF-1.4\n%%EOF".to_vec()
    }

    fn clock() -> FixedClock {
        FixedClock::at(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), 18)
    }

    #[test]
    fn test_open_reader_titles_from_document() {
        let store = Store::open_in_memory().unwrap();
        store.save_document("Ulysses.pdf", &pdf(), 30).unwrap();
        let clock = clock();
        let sink = RecordingSink::new();
        let reader = open_reader(&store, &clock, &sink).unwrap();
        assert_eq!(reader.book_title(), "Ulysses.pdf");
        assert_eq!(reader.phase(), Phase::Idle);
    }

    #[test]
    fn test_status_render() {
        let store = Store::open_in_memory().unwrap();
        store.save_document("Ulysses.pdf", &pdf(), 30).unwrap();
        let clock = clock();
        let sink = RecordingSink::new();
        let mut reader = open_reader(&store, &clock, &sink).unwrap();
        assert!(StatusReport::build(&reader).is_none());

        reader.start(5, 30).unwrap();
        reader.turn_forward().unwrap();
        let report = StatusReport::build(&reader).unwrap();
        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("day:        1 of 21"));
        assert!(text.contains("today:      1 / 5 pages (20%)"));
        assert!(text.contains("page:       2 / 30"));
        assert!(text.contains("resets in:  06:00:00"));
        assert!(text.contains("finish in:  ~6 days"));
    }

    #[test]
    fn test_surface_keeps_invalid_input_as_error() {
        let r: sliver_core::Result<()> = Err(HabitError::InvalidInput("bad".into()));
        assert!(surface(r).is_err());
        let r: sliver_core::Result<()> =
            Err(HabitError::Persistence(sliver_core::PersistenceError("down".into())));
        assert!(surface(r).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_watch_stops_after_max_ticks() {
        let store = Store::open_in_memory().unwrap();
        let clock = clock();
        let sink = RecordingSink::new();
        let mut reader = open_reader(&store, &clock, &sink).unwrap();
        let mut out = Vec::new();
        let ticks = watch(&mut reader, CancellationToken::new(), Some(2), &mut out)
            .await
            .unwrap();
        assert_eq!(ticks, 2);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("resets in 06:00:00 [idle]").count(), 2);
    }

    #[tokio::test]
    async fn test_watch_honours_cancellation() {
        let store = Store::open_in_memory().unwrap();
        let clock = clock();
        let sink = RecordingSink::new();
        let mut reader = open_reader(&store, &clock, &sink).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let ticks = watch(&mut reader, token, None, &mut Vec::new()).await.unwrap();
        assert_eq!(ticks, 0);
    }
}
