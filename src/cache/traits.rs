//! Core traits and types for the offline cache.

use serde::{de::DeserializeOwned, Serialize};

/// Trait for records that can be kept in the local store.
///
/// Implementors provide a unique store key and an entity type name so one
/// record table can hold more than one kind of record.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this record (e.g., a story id).
  fn store_key(&self) -> String;

  /// Entity type name for storage organization (e.g., "story").
  fn entity_type() -> &'static str;
}

/// Where the data in a [`FetchResult`] came from.
///
/// Provenance is recorded for observability and tests; nothing downstream
/// branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
  /// Fresh data from the remote API.
  Network,
  /// The network attempt failed and the local store answered.
  Cache,
  /// Neither the network nor the local store had anything.
  None,
}

/// The uniform envelope returned by every resilient data-access call.
///
/// Invariant, enforced by the constructors: `data` is populated exactly when
/// the call succeeded, and `error` exactly when it did not.
#[derive(Debug, Clone)]
pub struct FetchResult<T> {
  pub data: Option<T>,
  pub error: Option<String>,
  pub source: DataSource,
}

impl<T> FetchResult<T> {
  /// Successful result carrying fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data: Some(data),
      error: None,
      source: DataSource::Network,
    }
  }

  /// Successful result served from the local store after a network failure.
  pub fn from_store(data: T) -> Self {
    Self {
      data: Some(data),
      error: None,
      source: DataSource::Cache,
    }
  }

  /// Failed result: the network attempt failed and no cached data exists.
  pub fn unavailable(error: impl std::fmt::Display) -> Self {
    Self {
      data: None,
      error: Some(error.to_string()),
      source: DataSource::None,
    }
  }

  pub fn is_success(&self) -> bool {
    self.data.is_some()
  }
}
