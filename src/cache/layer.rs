//! Resilient read path: network first, local store on failure.

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use crate::error::Result;

use super::storage::RecordStorage;
use super::traits::{Cacheable, FetchResult};

/// Cache layer that wraps a network fetcher with a local-store fallback.
///
/// A read issues exactly one network attempt. Success is persisted for later
/// offline use; any failure - transport or a non-success status, the two are
/// not distinguished here - falls back to whatever the store holds.
pub struct CacheLayer<S: RecordStorage> {
  storage: Arc<S>,
}

impl<S: RecordStorage> CacheLayer<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  /// Fetch a list of records with store fallback.
  ///
  /// The fallback is not query-aware: it returns every stored record of the
  /// type, which for a paged feed means "everything seen so far".
  pub async fn fetch_list<T, F, Fut>(&self, fetcher: F) -> FetchResult<Vec<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    match fetcher().await {
      Ok(records) => {
        // Best-effort persistence: a store failure must never fail a read
        // that the network already answered.
        if let Err(err) = self.storage.upsert_many(&records) {
          warn!("failed to persist fetched records: {err}");
        }
        FetchResult::from_network(records)
      }
      Err(err) => match self.storage.get_all::<T>() {
        Ok(cached) if !cached.is_empty() => FetchResult::from_store(cached),
        Ok(_) => FetchResult::unavailable(&err),
        Err(store_err) => {
          FetchResult::unavailable(format!("{err}; local store unavailable: {store_err}"))
        }
      },
    }
  }

  /// Fetch a single record with store fallback.
  pub async fn fetch_one<T, F, Fut>(&self, key: &str, fetcher: F) -> FetchResult<T>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    match fetcher().await {
      Ok(record) => {
        if let Err(err) = self.storage.upsert_many(std::slice::from_ref(&record)) {
          warn!("failed to persist fetched record: {err}");
        }
        FetchResult::from_network(record)
      }
      Err(err) => match self.storage.get_one::<T>(key) {
        Ok(Some(cached)) => FetchResult::from_store(cached),
        Ok(None) => FetchResult::unavailable(&err),
        Err(store_err) => {
          FetchResult::unavailable(format!("{err}; local store unavailable: {store_err}"))
        }
      },
    }
  }
}

impl<S: RecordStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::SqliteStorage;
  use crate::cache::traits::DataSource;
  use crate::error::Error;
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

  fn note(id: &str) -> Note {
    Note {
      id: id.to_string(),
      text: format!("text for {id}"),
    }
  }

  fn network_down() -> Error {
    Error::Transport("connection refused".into())
  }

  /// Storage whose writes always fail; reads delegate to nothing.
  struct BrokenStorage;

  impl RecordStorage for BrokenStorage {
    fn upsert_many<T: Cacheable>(&self, _records: &[T]) -> crate::error::Result<()> {
      Err(Error::Storage("disk full".into()))
    }

    fn get_all<T: Cacheable>(&self) -> crate::error::Result<Vec<T>> {
      Err(Error::Storage("disk full".into()))
    }

    fn get_one<T: Cacheable>(&self, _key: &str) -> crate::error::Result<Option<T>> {
      Err(Error::Storage("disk full".into()))
    }

    fn clear(&self) -> crate::error::Result<()> {
      Err(Error::Storage("disk full".into()))
    }
  }

  #[tokio::test]
  async fn test_network_success_persists_and_reports_network() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let layer = CacheLayer::new(Arc::clone(&storage));

    let result = layer
      .fetch_list(|| async { Ok(vec![note("a"), note("b")]) })
      .await;

    assert!(result.is_success());
    assert_eq!(result.source, DataSource::Network);
    assert_eq!(result.data.unwrap().len(), 2);

    // Every returned record must now be retrievable by id.
    let stored: Option<Note> = storage.get_one("a").unwrap();
    assert_eq!(stored, Some(note("a")));
    let stored: Option<Note> = storage.get_one("b").unwrap();
    assert_eq!(stored, Some(note("b")));
  }

  #[tokio::test]
  async fn test_network_failure_serves_store() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.upsert_many(&[note("a")]).unwrap();
    let layer = CacheLayer::new(storage);

    let result = layer
      .fetch_list::<Note, _, _>(|| async { Err(network_down()) })
      .await;

    assert!(result.is_success());
    assert_eq!(result.source, DataSource::Cache);
    assert_eq!(result.data.unwrap(), vec![note("a")]);
    assert!(result.error.is_none());
  }

  #[tokio::test]
  async fn test_api_failure_serves_store() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.upsert_many(&[note("a")]).unwrap();
    let layer = CacheLayer::new(storage);

    // Non-2xx responses fall back exactly like transport errors.
    let result = layer
      .fetch_list::<Note, _, _>(|| async {
        Err(Error::Api {
          status: 500,
          message: "boom".into(),
        })
      })
      .await;

    assert!(result.is_success());
    assert_eq!(result.source, DataSource::Cache);
  }

  #[tokio::test]
  async fn test_network_failure_with_empty_store_fails() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let layer = CacheLayer::new(storage);

    let result = layer
      .fetch_list::<Note, _, _>(|| async { Err(network_down()) })
      .await;

    assert!(!result.is_success());
    assert!(result.data.is_none());
    assert_eq!(result.source, DataSource::None);
    assert!(result.error.unwrap().contains("connection refused"));
  }

  #[tokio::test]
  async fn test_persistence_failure_does_not_fail_the_read() {
    let layer = CacheLayer::new(Arc::new(BrokenStorage));

    let result = layer.fetch_list(|| async { Ok(vec![note("a")]) }).await;

    assert!(result.is_success());
    assert_eq!(result.source, DataSource::Network);
  }

  #[tokio::test]
  async fn test_fetch_one_fallback_by_key() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.upsert_many(&[note("a"), note("b")]).unwrap();
    let layer = CacheLayer::new(storage);

    let result = layer
      .fetch_one::<Note, _, _>("b", || async { Err(network_down()) })
      .await;

    assert_eq!(result.source, DataSource::Cache);
    assert_eq!(result.data.unwrap(), note("b"));

    let missing = layer
      .fetch_one::<Note, _, _>("zzz", || async { Err(network_down()) })
      .await;
    assert!(!missing.is_success());
    assert_eq!(missing.source, DataSource::None);
  }

  #[tokio::test]
  async fn test_broken_store_reports_both_failures() {
    let layer = CacheLayer::new(Arc::new(BrokenStorage));

    let result = layer
      .fetch_list::<Note, _, _>(|| async { Err(network_down()) })
      .await;

    assert!(!result.is_success());
    let message = result.error.unwrap();
    assert!(message.contains("connection refused"));
    assert!(message.contains("local store unavailable"));
  }
}
