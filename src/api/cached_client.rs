//! Story client with the network-first, fall-back-to-store read path.

use std::sync::Arc;

use crate::cache::{CacheLayer, FetchResult, SqliteStorage};

use super::client::StoryClient;
use super::types::Story;

/// Wraps [`StoryClient`] reads with the resilient cache layer. Writes and
/// authentication stay on the plain client.
#[derive(Clone)]
pub struct CachedStoryClient {
  inner: StoryClient,
  cache: CacheLayer<SqliteStorage>,
}

impl CachedStoryClient {
  pub fn new(inner: StoryClient, storage: Arc<SqliteStorage>) -> Self {
    Self {
      inner,
      cache: CacheLayer::new(storage),
    }
  }

  /// One page of the feed; on network failure, whatever the store holds.
  pub async fn fetch_list(
    &self,
    token: &str,
    page: u32,
    size: u32,
    location: bool,
  ) -> FetchResult<Vec<Story>> {
    self
      .cache
      .fetch_list(|| {
        let inner = self.inner.clone();
        let token = token.to_string();
        async move { inner.list_stories(&token, page, size, location).await }
      })
      .await
  }

  /// One story by id, with store fallback.
  pub async fn fetch_detail(&self, token: &str, id: &str) -> FetchResult<Story> {
    self
      .cache
      .fetch_one(id, || {
        let inner = self.inner.clone();
        let token = token.to_string();
        let id = id.to_string();
        async move { inner.get_story(&token, &id).await }
      })
      .await
  }
}
