use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::Result;
use crate::schema;

/// Database filename inside the data directory.
pub const DB_FILE: &str = "sliver.db";

const DEVICE_ID_KEY: &str = "device_id";

/// Default base directory for all sliver storage.
pub fn default_base_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".sliver")
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        let store = Self { conn };
        tracing::debug!(
            "opened store at {} (schema v{})",
            path.display(),
            store.schema_version()?.unwrap_or_default()
        );
        Ok(store)
    }

    /// Open (creating if needed) the database inside `dir`.
    pub fn open_in(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Self::open(&dir.join(DB_FILE))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn schema_version(&self) -> Result<Option<i64>> {
        schema::get_schema_version(&self.conn)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Anonymous installation id, created on first use and kept for good.
    pub fn device_id(&self) -> Result<String> {
        if let Some(id) = self.get_metadata(DEVICE_ID_KEY)? {
            return Ok(id);
        }
        let id = Uuid::new_v4().to_string();
        self.set_metadata(DEVICE_ID_KEY, &id)?;
        tracing::info!("generated device id {id}");
        Ok(id)
    }

    /// Remove the stored document and the habit record together.
    pub fn clear_all(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch("DELETE FROM habit_state; DELETE FROM documents;")?;
        tx.commit()?;
        tracing::info!("cleared document and habit state");
        Ok(())
    }

    /// Flush the WAL into the main database file.
    pub fn checkpoint_truncate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_metadata() {
        let store = Store::open_in_memory().unwrap();

        assert!(store.get_metadata("foo").unwrap().is_none());

        store.set_metadata("foo", "bar").unwrap();
        assert_eq!(store.get_metadata("foo").unwrap(), Some("bar".to_string()));

        store.set_metadata("foo", "baz").unwrap();
        assert_eq!(store.get_metadata("foo").unwrap(), Some("baz".to_string()));
    }

    #[test]
    fn test_schema_version_after_reopen() {
        let dir = TempDir::new().unwrap();
        Store::open_in(dir.path()).unwrap();
        let store = Store::open_in(dir.path()).unwrap();
        assert_eq!(store.schema_version().unwrap(), Some(schema::SCHEMA_VERSION));
    }

    #[test]
    fn test_device_id_is_stable() {
        let store = Store::open_in_memory().unwrap();
        let first = store.device_id().unwrap();
        let second = store.device_id().unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_device_id_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let id = Store::open_in(dir.path()).unwrap().device_id().unwrap();
        let again = Store::open_in(dir.path()).unwrap().device_id().unwrap();
        assert_eq!(id, again);
        assert!(dir.path().join(DB_FILE).exists());
    }

    #[test]
    fn test_open_in_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        Store::open_in(&nested).unwrap();
        assert!(nested.join(DB_FILE).exists());
    }
}
