//! Persisted session state.
//!
//! Components never reach for ambient state; whoever needs the session gets
//! a [`SessionStore`] handed to them explicitly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// The authenticated user, persisted across runs until logout.
///
/// The on-disk field names are part of the external contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  #[serde(rename = "authToken")]
  pub token: String,
  #[serde(rename = "userId")]
  pub user_id: String,
  #[serde(rename = "userName")]
  pub name: String,
}

pub trait SessionStore: Send + Sync {
  fn get(&self) -> Result<Option<Session>>;
  fn set(&self, session: &Session) -> Result<()>;
  fn clear(&self) -> Result<()>;
}

/// Session persisted as a JSON file in the platform data directory.
pub struct FileSessionStore {
  path: PathBuf,
}

impl FileSessionStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::Storage("could not determine data directory".into()))?;

    Ok(Self::at(data_dir.join("tales").join("session.json")))
  }

  pub fn at(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl SessionStore for FileSessionStore {
  fn get(&self) -> Result<Option<Session>> {
    if !self.path.exists() {
      return Ok(None);
    }
    let contents = std::fs::read_to_string(&self.path)
      .map_err(|e| Error::Storage(format!("failed to read session file: {e}")))?;
    let session = serde_json::from_str(&contents)
      .map_err(|e| Error::Storage(format!("failed to parse session file: {e}")))?;
    Ok(Some(session))
  }

  fn set(&self, session: &Session) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Storage(format!("failed to create data directory: {e}")))?;
    }
    let contents = serde_json::to_string_pretty(session)
      .map_err(|e| Error::Storage(format!("failed to serialize session: {e}")))?;
    std::fs::write(&self.path, contents)
      .map_err(|e| Error::Storage(format!("failed to write session file: {e}")))
  }

  fn clear(&self) -> Result<()> {
    if self.path.exists() {
      std::fs::remove_file(&self.path)
        .map_err(|e| Error::Storage(format!("failed to remove session file: {e}")))?;
    }
    Ok(())
  }
}

/// In-memory session store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySessionStore {
  inner: Mutex<Option<Session>>,
}

impl SessionStore for MemorySessionStore {
  fn get(&self) -> Result<Option<Session>> {
    Ok(self.lock()?.clone())
  }

  fn set(&self, session: &Session) -> Result<()> {
    *self.lock()? = Some(session.clone());
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    *self.lock()? = None;
    Ok(())
  }
}

impl MemorySessionStore {
  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Session>>> {
    self
      .inner
      .lock()
      .map_err(|e| Error::Storage(format!("lock poisoned: {e}")))
  }
}
