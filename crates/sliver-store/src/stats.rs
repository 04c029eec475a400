//! Anonymous milestone counting for the stats backend.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use sliver_core::{EventKind, now_iso8601};

use crate::error::{Result, StoreError};
use crate::store::Store;

/// Aggregate counts reported by `GET /api/stats`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatCounts {
    pub total_unique_users: i64,
    pub total_uploads: i64,
    pub total_daily_goals_met: i64,
    pub total_habits_mastered: i64,
}

impl Store {
    /// Record one event, registering the device on first sight. Returns the stat id.
    pub fn record_event(&self, device_id: &str, book_title: &str, kind: EventKind) -> Result<i64> {
        if device_id.is_empty() || book_title.is_empty() {
            return Err(StoreError::InvalidData(
                "device_id and book_title are required".to_string(),
            ));
        }
        let now = now_iso8601();
        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO users (device_id, created_at) VALUES (?1, ?2)",
            params![device_id, now],
        )?;
        tx.execute(
            "INSERT INTO book_stats (device_id, book_title, event_type, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![device_id, book_title, kind.as_str(), now],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        tracing::debug!("recorded {kind} for '{book_title}' as stat {id}");
        Ok(id)
    }

    pub fn event_count(&self, kind: EventKind) -> Result<i64> {
        let n = self.conn().query_row(
            "SELECT count(*) FROM book_stats WHERE event_type = ?1",
            [kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    pub fn stat_counts(&self) -> Result<StatCounts> {
        let total_unique_users =
            self.conn()
                .query_row("SELECT count(*) FROM users", [], |row| row.get(0))?;
        Ok(StatCounts {
            total_unique_users,
            total_uploads: self.event_count(EventKind::UploadStarted)?,
            total_daily_goals_met: self.event_count(EventKind::DailyGoalReached)?,
            total_habits_mastered: self.event_count(EventKind::FreedomStageReached)?,
        })
    }
}
