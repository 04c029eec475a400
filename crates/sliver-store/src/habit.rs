use rusqlite::{OptionalExtension, params};
use sliver_core::{HabitRepository, HabitState, PersistenceError, export_json, import_json, now_iso8601};

use crate::error::Result;
use crate::store::Store;

impl Store {
    /// The single habit record, if one exists. A corrupt record reads as absent.
    pub fn load_habit(&self) -> Result<Option<HabitState>> {
        let payload: Option<String> = self
            .conn()
            .query_row("SELECT payload FROM habit_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        match import_json(&payload) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!("discarding unreadable habit record: {e}");
                Ok(None)
            }
        }
    }

    pub fn save_habit(&self, state: &HabitState) -> Result<()> {
        let payload = export_json(state)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO habit_state (id, payload, updated_at) VALUES (1, ?1, ?2)",
            params![payload, now_iso8601()],
        )?;
        Ok(())
    }

    pub fn clear_habit(&self) -> Result<()> {
        self.conn().execute("DELETE FROM habit_state", [])?;
        Ok(())
    }
}

impl HabitRepository for Store {
    fn load(&self) -> std::result::Result<Option<HabitState>, PersistenceError> {
        Ok(self.load_habit()?)
    }

    fn save(&self, state: &HabitState) -> std::result::Result<(), PersistenceError> {
        Ok(self.save_habit(state)?)
    }

    fn clear(&self) -> std::result::Result<(), PersistenceError> {
        Ok(self.clear_habit()?)
    }
}
