//! Milestone events and the sink they are emitted into.
//!
//! The controller only emits; delivery (and its failures) belongs to
//! whoever implements [`EventSink`].

use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    UploadStarted,
    DailyGoalReached,
    FreedomStageReached,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::UploadStarted,
        EventKind::DailyGoalReached,
        EventKind::FreedomStageReached,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::UploadStarted => "upload_started",
            EventKind::DailyGoalReached => "daily_goal_reached",
            EventKind::FreedomStageReached => "freedom_stage_reached",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("Invalid event_type. Must be one of: {}", valid.join(", "))
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Milestone {
    pub book_title: String,
    pub kind: EventKind,
}

impl Milestone {
    pub fn new(book_title: &str, kind: EventKind) -> Self {
        Self {
            book_title: book_title.to_string(),
            kind,
        }
    }
}

/// Fire-and-forget receiver of milestones. Must not block the caller.
pub trait EventSink {
    fn emit(&self, milestone: &Milestone);
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn emit(&self, milestone: &Milestone) {
        (**self).emit(milestone)
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _milestone: &Milestone) {}
}

/// Keeps every emitted milestone in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<Milestone>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Milestone> {
        self.events.borrow().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|m| m.kind == kind).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, milestone: &Milestone) {
        self.events.borrow_mut().push(milestone.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_lists_valid_names() {
        let err = "finished".parse::<EventKind>().unwrap_err();
        assert!(err.contains("upload_started, daily_goal_reached, freedom_stage_reached"));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&EventKind::FreedomStageReached).unwrap();
        assert_eq!(json, "\"freedom_stage_reached\"");
    }

    #[test]
    fn test_recording_sink_counts() {
        let sink = RecordingSink::new();
        sink.emit(&Milestone::new("Dune", EventKind::DailyGoalReached));
        sink.emit(&Milestone::new("Dune", EventKind::DailyGoalReached));
        assert_eq!(sink.count(EventKind::DailyGoalReached), 2);
        assert_eq!(sink.count(EventKind::UploadStarted), 0);
    }
}
