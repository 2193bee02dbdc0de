//! Named cache buckets with per-bucket policy and eviction bounds.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

use super::backend::{Destination, GatewayRequest, GatewayResponse, Method};

/// Bucket names are external identity: purge commands target them exactly.
pub const STORY_LIST_CACHE: &str = "story-api-cache";
pub const STORY_DETAIL_CACHE: &str = "story-detail-api-cache";
pub const IMAGE_CACHE: &str = "app-images-cache";

/// Freshness policy applied to a bucket's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
  /// Serve a hit immediately and refresh it from the network in the
  /// background; the refresh only affects future reads.
  StaleWhileRevalidate,
  /// Serve a hit without touching the network; fetch only on a miss.
  CacheFirst,
}

/// Which requests a bucket claims.
#[derive(Debug, Clone)]
pub enum Matcher {
  UrlPrefix(String),
  Destination(Destination),
}

impl Matcher {
  fn matches(&self, request: &GatewayRequest) -> bool {
    match self {
      Matcher::UrlPrefix(prefix) => request.url.as_str().starts_with(prefix.as_str()),
      Matcher::Destination(destination) => request.destination == *destination,
    }
  }
}

#[derive(Debug, Clone)]
struct CacheEntry {
  response: GatewayResponse,
  cached_at: DateTime<Utc>,
}

/// One named cache with its matching rule, policy, and eviction bounds.
///
/// Entry count and age are enforced independently: an entry can be dropped
/// by either rule. Recency order is tracked front-to-back, most recently
/// used first.
pub struct CacheBucket {
  name: &'static str,
  matcher: Matcher,
  policy: CachePolicy,
  max_entries: usize,
  max_age: Duration,
  entries: HashMap<String, CacheEntry>,
  order: VecDeque<String>,
}

impl CacheBucket {
  pub fn new(
    name: &'static str,
    matcher: Matcher,
    policy: CachePolicy,
    max_entries: usize,
    max_age: Duration,
  ) -> Self {
    Self {
      name,
      matcher,
      policy,
      max_entries,
      max_age,
      entries: HashMap::new(),
      order: VecDeque::new(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn policy(&self) -> CachePolicy {
    self.policy
  }

  /// Only GET requests are cacheable; everything else bypasses the bucket.
  pub fn claims(&self, request: &GatewayRequest) -> bool {
    request.method == Method::Get && self.matcher.matches(request)
  }

  /// Look up a cached response. An entry past its maximum age counts as a
  /// miss and is dropped on the spot; a hit refreshes its recency.
  pub fn lookup(&mut self, key: &str) -> Option<GatewayResponse> {
    let expired = match self.entries.get(key) {
      Some(entry) => Utc::now() - entry.cached_at > self.max_age,
      None => return None,
    };

    if expired {
      self.entries.remove(key);
      self.order.retain(|k| k != key);
      return None;
    }

    self.touch(key);
    self.entries.get(key).map(|entry| entry.response.clone())
  }

  /// Insert or refresh an entry, evicting the least recently used entries
  /// beyond the bucket's bound.
  pub fn insert(&mut self, key: String, response: GatewayResponse) {
    self.entries.insert(
      key.clone(),
      CacheEntry {
        response,
        cached_at: Utc::now(),
      },
    );
    self.touch(&key);

    while self.entries.len() > self.max_entries {
      match self.order.pop_back() {
        Some(oldest) => {
          self.entries.remove(&oldest);
        }
        None => break,
      }
    }
  }

  pub fn clear(&mut self) {
    self.entries.clear();
    self.order.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  fn touch(&mut self, key: &str) {
    self.order.retain(|k| k != key);
    self.order.push_front(key.to_string());
  }

  /// Shift an entry's timestamp into the past.
  #[cfg(test)]
  pub fn backdate(&mut self, key: &str, by: Duration) {
    if let Some(entry) = self.entries.get_mut(key) {
      entry.cached_at = entry.cached_at - by;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn bucket(max_entries: usize, max_age: Duration) -> CacheBucket {
    CacheBucket::new(
      STORY_LIST_CACHE,
      Matcher::UrlPrefix("https://api.example/v1/stories".into()),
      CachePolicy::StaleWhileRevalidate,
      max_entries,
      max_age,
    )
  }

  fn response(body: &str) -> GatewayResponse {
    GatewayResponse {
      status: 200,
      body: body.as_bytes().to_vec(),
    }
  }

  #[test]
  fn test_lookup_roundtrip() {
    let mut bucket = bucket(10, Duration::hours(24));

    assert!(bucket.lookup("k1").is_none());
    bucket.insert("k1".into(), response("v1"));
    assert_eq!(bucket.lookup("k1").unwrap().body, b"v1");
  }

  #[test]
  fn test_entry_count_eviction_drops_least_recent() {
    let mut bucket = bucket(3, Duration::hours(24));

    bucket.insert("k1".into(), response("v1"));
    bucket.insert("k2".into(), response("v2"));
    bucket.insert("k3".into(), response("v3"));

    // Touch k1 so k2 becomes the eviction candidate.
    assert!(bucket.lookup("k1").is_some());

    bucket.insert("k4".into(), response("v4"));

    assert_eq!(bucket.len(), 3);
    assert!(bucket.lookup("k2").is_none());
    assert!(bucket.lookup("k1").is_some());
    assert!(bucket.lookup("k3").is_some());
    assert!(bucket.lookup("k4").is_some());
  }

  #[test]
  fn test_insertion_order_eviction_without_reads() {
    let mut bucket = bucket(2, Duration::hours(24));

    bucket.insert("k1".into(), response("v1"));
    bucket.insert("k2".into(), response("v2"));
    bucket.insert("k3".into(), response("v3"));

    // Never-read entries fall out earliest-inserted first.
    assert!(bucket.lookup("k1").is_none());
    assert!(bucket.lookup("k2").is_some());
    assert!(bucket.lookup("k3").is_some());
  }

  #[test]
  fn test_expired_entry_is_a_miss() {
    let mut bucket = bucket(10, Duration::hours(1));

    bucket.insert("k1".into(), response("v1"));
    bucket.backdate("k1", Duration::hours(2));

    assert!(bucket.lookup("k1").is_none());
    // The expired entry is gone, not merely hidden.
    assert_eq!(bucket.len(), 0);
  }

  #[test]
  fn test_only_get_requests_are_claimed() {
    let bucket = bucket(10, Duration::hours(24));
    let url = Url::parse("https://api.example/v1/stories?page=1").unwrap();

    let get = GatewayRequest::get(url.clone());
    assert!(bucket.claims(&get));

    let post = GatewayRequest::post_json(url, serde_json::json!({}));
    assert!(!bucket.claims(&post));
  }

  #[test]
  fn test_destination_matcher() {
    let bucket = CacheBucket::new(
      IMAGE_CACHE,
      Matcher::Destination(Destination::Image),
      CachePolicy::CacheFirst,
      10,
      Duration::days(30),
    );
    let url = Url::parse("https://cdn.example/photos/1.jpg").unwrap();

    assert!(bucket.claims(&GatewayRequest::get(url.clone()).image()));
    assert!(!bucket.claims(&GatewayRequest::get(url)));
  }
}
