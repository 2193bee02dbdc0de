//! Record storage trait and SQLite implementation.

use rusqlite::{params, Connection};
use std::sync::Mutex;

use crate::error::{Error, Result};

use super::traits::Cacheable;

/// Trait for local record stores.
///
/// All operations are per-call transactional; a failed batch leaves the store
/// untouched. Lookups are by identifier only, insertion order carries no
/// meaning.
pub trait RecordStorage: Send + Sync {
  /// Insert records, replacing any existing record with the same key.
  fn upsert_many<T: Cacheable>(&self, records: &[T]) -> Result<()>;

  /// All stored records of the given entity type.
  fn get_all<T: Cacheable>(&self) -> Result<Vec<T>>;

  /// A single record by key.
  fn get_one<T: Cacheable>(&self, key: &str) -> Result<Option<T>>;

  /// Drop every record of every entity type.
  fn clear(&self) -> Result<()>;
}

/// Storage implementation that doesn't keep anything.
/// Used when the offline cache is disabled - all operations are no-ops.
pub struct NoopStorage;

impl RecordStorage for NoopStorage {
  fn upsert_many<T: Cacheable>(&self, _records: &[T]) -> Result<()> {
    Ok(()) // Discard
  }

  fn get_all<T: Cacheable>(&self) -> Result<Vec<T>> {
    Ok(Vec::new()) // Always miss
  }

  fn get_one<T: Cacheable>(&self, _key: &str) -> Result<Option<T>> {
    Ok(None) // Always miss
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based record store.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for the record store. One table keyed by entity type + record key;
/// payloads are serialized JSON.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS record_cache (
    entity_type TEXT NOT NULL,
    record_key TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (entity_type, record_key)
);
"#;

impl SqliteStorage {
  /// Open (or create) the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Storage(format!("failed to create data directory: {e}")))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| Error::Storage(format!("failed to open store at {}: {e}", path.display())))?;

    Self::from_connection(conn)
  }

  /// Open a throwaway in-memory store.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::Storage(format!("failed to open in-memory store: {e}")))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::Storage("could not determine data directory".into()))?;

    Ok(data_dir.join("tales").join("stories.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = lock(&self.conn)?;

    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| Error::Storage(format!("failed to run store migrations: {e}")))?;

    Ok(())
  }
}

impl RecordStorage for SqliteStorage {
  fn upsert_many<T: Cacheable>(&self, records: &[T]) -> Result<()> {
    let mut conn = lock(&self.conn)?;
    let entity_type = T::entity_type();

    // Dropping the transaction without committing rolls the batch back, so a
    // failure midway leaves the store unchanged.
    let tx = conn
      .transaction()
      .map_err(|e| Error::Storage(format!("failed to begin transaction: {e}")))?;

    for record in records {
      let key = record.store_key();
      let data = serde_json::to_vec(record)
        .map_err(|e| Error::Storage(format!("failed to serialize record: {e}")))?;

      tx.execute(
        "INSERT OR REPLACE INTO record_cache (entity_type, record_key, data, cached_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![entity_type, key, data],
      )
      .map_err(|e| Error::Storage(format!("failed to store record: {e}")))?;
    }

    tx.commit()
      .map_err(|e| Error::Storage(format!("failed to commit batch: {e}")))
  }

  fn get_all<T: Cacheable>(&self) -> Result<Vec<T>> {
    let conn = lock(&self.conn)?;
    let entity_type = T::entity_type();

    let mut stmt = conn
      .prepare("SELECT data FROM record_cache WHERE entity_type = ?")
      .map_err(|e| Error::Storage(format!("failed to prepare query: {e}")))?;

    let records: Vec<T> = stmt
      .query_map(params![entity_type], |row| {
        let data: Vec<u8> = row.get(0)?;
        Ok(data)
      })
      .map_err(|e| Error::Storage(format!("failed to query records: {e}")))?
      .filter_map(|r| r.ok())
      .filter_map(|data| serde_json::from_slice(&data).ok())
      .collect();

    Ok(records)
  }

  fn get_one<T: Cacheable>(&self, key: &str) -> Result<Option<T>> {
    let conn = lock(&self.conn)?;
    let entity_type = T::entity_type();

    let mut stmt = conn
      .prepare("SELECT data FROM record_cache WHERE entity_type = ? AND record_key = ?")
      .map_err(|e| Error::Storage(format!("failed to prepare query: {e}")))?;

    let data: Option<Vec<u8>> = stmt
      .query_row(params![entity_type, key], |row| row.get(0))
      .ok();

    match data {
      Some(data) => {
        let record: T = serde_json::from_slice(&data)
          .map_err(|e| Error::Storage(format!("failed to deserialize record: {e}")))?;
        Ok(Some(record))
      }
      None => Ok(None),
    }
  }

  fn clear(&self) -> Result<()> {
    let conn = lock(&self.conn)?;

    conn
      .execute("DELETE FROM record_cache", [])
      .map_err(|e| Error::Storage(format!("failed to clear store: {e}")))?;

    Ok(())
  }
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
  conn
    .lock()
    .map_err(|e| Error::Storage(format!("lock poisoned: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Note {
    id: String,
    text: String,
  }

  impl Cacheable for Note {
    fn store_key(&self) -> String {
      self.id.clone()
    }

    fn entity_type() -> &'static str {
      "note"
    }
  }

  fn note(id: &str, text: &str) -> Note {
    Note {
      id: id.to_string(),
      text: text.to_string(),
    }
  }

  #[test]
  fn test_upsert_and_get_one() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    storage.upsert_many(&[note("a", "first"), note("b", "second")]).unwrap();

    let found: Option<Note> = storage.get_one("a").unwrap();
    assert_eq!(found, Some(note("a", "first")));
    let missing: Option<Note> = storage.get_one("zzz").unwrap();
    assert!(missing.is_none());
  }

  #[test]
  fn test_upsert_replaces_by_key() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    storage.upsert_many(&[note("a", "old")]).unwrap();
    storage.upsert_many(&[note("a", "new")]).unwrap();

    let all: Vec<Note> = storage.get_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].text, "new");
  }

  #[test]
  fn test_upsert_is_idempotent() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let records = [note("a", "first"), note("b", "second")];

    storage.upsert_many(&records).unwrap();
    storage.upsert_many(&records).unwrap();

    let all: Vec<Note> = storage.get_all().unwrap();
    assert_eq!(all.len(), 2);
  }

  #[test]
  fn test_clear_removes_everything() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    storage.upsert_many(&[note("a", "first")]).unwrap();
    storage.clear().unwrap();

    let all: Vec<Note> = storage.get_all().unwrap();
    assert!(all.is_empty());
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;

    storage.upsert_many(&[note("a", "first")]).unwrap();

    let all: Vec<Note> = storage.get_all().unwrap();
    assert!(all.is_empty());
    let one: Option<Note> = storage.get_one("a").unwrap();
    assert!(one.is_none());
  }
}
