//! The gateway task: request interception, caching policies, and the purge
//! command handler.
//!
//! The worker runs on its own task and owns both the HTTP backend and the
//! cache buckets; the rest of the program talks to it exclusively through
//! [`GatewayHandle`] messages and reads replies from oneshot channels.

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

use super::backend::{Backend, Destination, GatewayRequest, GatewayResponse};
use super::bucket::{
  CacheBucket, CachePolicy, Matcher, IMAGE_CACHE, STORY_DETAIL_CACHE, STORY_LIST_CACHE,
};

/// Outcome of purging one named bucket.
#[derive(Debug, Clone)]
pub struct BucketPurge {
  pub name: String,
  pub error: Option<String>,
}

/// Reply to a purge command, one outcome per requested bucket.
#[derive(Debug, Clone)]
pub struct PurgeReport {
  pub buckets: Vec<BucketPurge>,
}

impl PurgeReport {
  pub fn is_success(&self) -> bool {
    self.buckets.iter().all(|bucket| bucket.error.is_none())
  }

  /// Joined error text, if any bucket failed.
  pub fn error(&self) -> Option<String> {
    let errors: Vec<&str> = self
      .buckets
      .iter()
      .filter_map(|bucket| bucket.error.as_deref())
      .collect();
    if errors.is_empty() {
      None
    } else {
      Some(errors.join("; "))
    }
  }
}

enum Message {
  Fetch {
    request: GatewayRequest,
    reply: oneshot::Sender<Result<GatewayResponse>>,
  },
  Purge {
    names: Vec<String>,
    reply: oneshot::Sender<PurgeReport>,
  },
  /// A background transfer finished; store its result for future reads.
  StoreFresh {
    bucket: &'static str,
    key: String,
    response: GatewayResponse,
  },
}

/// Handle for talking to the gateway task.
#[derive(Clone)]
pub struct GatewayHandle {
  tx: mpsc::UnboundedSender<Message>,
}

impl GatewayHandle {
  /// Spawn the gateway task with the standard bucket set for `api_base`.
  pub fn spawn(backend: Arc<dyn Backend>, api_base: &Url) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = GatewayWorker {
      backend,
      buckets: standard_buckets(api_base),
      rx,
      tx: tx.clone(),
    };
    tokio::spawn(worker.run());
    Self { tx }
  }

  /// Route one request through the gateway and wait for its response.
  pub async fn fetch(&self, request: GatewayRequest) -> Result<GatewayResponse> {
    let (reply, rx) = oneshot::channel();
    self
      .tx
      .send(Message::Fetch { request, reply })
      .map_err(|_| Error::Transport("cache gateway is gone".into()))?;
    rx.await
      .map_err(|_| Error::Transport("cache gateway dropped the request".into()))?
  }

  /// Ask the gateway to drop every entry in the named buckets.
  pub async fn purge(&self, names: &[&str]) -> Result<PurgeReport> {
    let (reply, rx) = oneshot::channel();
    self
      .tx
      .send(Message::Purge {
        names: names.iter().map(|n| n.to_string()).collect(),
        reply,
      })
      .map_err(|_| Error::Transport("cache gateway is gone".into()))?;
    rx.await
      .map_err(|_| Error::Transport("cache gateway dropped the request".into()))
  }
}

/// The bucket registry. Checked in order, first match wins; the detail
/// prefix must come before the list prefix it extends, or detail responses
/// would land in the list bucket.
fn standard_buckets(api_base: &Url) -> Vec<CacheBucket> {
  let base = api_base.as_str().trim_end_matches('/').to_string();
  vec![
    CacheBucket::new(
      STORY_DETAIL_CACHE,
      Matcher::UrlPrefix(format!("{base}/stories/")),
      CachePolicy::StaleWhileRevalidate,
      20,
      Duration::days(7),
    ),
    CacheBucket::new(
      STORY_LIST_CACHE,
      Matcher::UrlPrefix(format!("{base}/stories")),
      CachePolicy::StaleWhileRevalidate,
      50,
      Duration::hours(24),
    ),
    CacheBucket::new(
      IMAGE_CACHE,
      Matcher::Destination(Destination::Image),
      CachePolicy::CacheFirst,
      60,
      Duration::days(30),
    ),
  ]
}

struct GatewayWorker {
  backend: Arc<dyn Backend>,
  buckets: Vec<CacheBucket>,
  rx: mpsc::UnboundedReceiver<Message>,
  /// Loopback sender for background refresh completions.
  tx: mpsc::UnboundedSender<Message>,
}

impl GatewayWorker {
  async fn run(mut self) {
    while let Some(message) = self.rx.recv().await {
      match message {
        Message::Fetch { request, reply } => self.handle_fetch(request, reply),
        Message::Purge { names, reply } => {
          let _ = reply.send(self.purge(&names));
        }
        Message::StoreFresh {
          bucket,
          key,
          response,
        } => self.store_fresh(bucket, key, response),
      }
    }
  }

  /// Dispatch one request. Network transfers run on their own tasks so the
  /// worker loop stays free to serve cache hits while they are in flight.
  fn handle_fetch(&mut self, request: GatewayRequest, reply: oneshot::Sender<Result<GatewayResponse>>) {
    let backend = Arc::clone(&self.backend);

    let Some(bucket) = self.buckets.iter_mut().find(|b| b.claims(&request)) else {
      // No bucket claims it: plain pass-through, nothing cached.
      tokio::spawn(async move {
        let _ = reply.send(backend.execute(&request).await);
      });
      return;
    };

    let key = request.cache_key();
    let name = bucket.name();
    let policy = bucket.policy();
    let cached = bucket.lookup(&key);
    let tx = self.tx.clone();

    match (policy, cached) {
      (CachePolicy::CacheFirst, Some(response)) => {
        let _ = reply.send(Ok(response));
      }
      (CachePolicy::StaleWhileRevalidate, Some(response)) => {
        // The caller gets the cached copy now; the refresh races on its own
        // and only ever affects future reads.
        let _ = reply.send(Ok(response));
        tokio::spawn(async move {
          match backend.execute(&request).await {
            Ok(fresh) if fresh.is_success() => {
              let _ = tx.send(Message::StoreFresh {
                bucket: name,
                key,
                response: fresh,
              });
            }
            Ok(fresh) => debug!("revalidation of {} returned {}", request.url, fresh.status),
            Err(err) => debug!("revalidation of {} failed: {err}", request.url),
          }
        });
      }
      (_, None) => {
        tokio::spawn(async move {
          let result = backend.execute(&request).await;
          if let Ok(response) = &result {
            if response.is_success() {
              let _ = tx.send(Message::StoreFresh {
                bucket: name,
                key,
                response: response.clone(),
              });
            }
          }
          let _ = reply.send(result);
        });
      }
    }
  }

  fn store_fresh(&mut self, bucket: &str, key: String, response: GatewayResponse) {
    if let Some(bucket) = self.buckets.iter_mut().find(|b| b.name() == bucket) {
      bucket.insert(key, response);
    }
  }

  fn purge(&mut self, names: &[String]) -> PurgeReport {
    let buckets = names
      .iter()
      .map(|name| match self.buckets.iter_mut().find(|b| b.name() == name.as_str()) {
        Some(bucket) => {
          bucket.clear();
          BucketPurge {
            name: name.clone(),
            error: None,
          }
        }
        None => BucketPurge {
          name: name.clone(),
          error: Some(format!("no such cache bucket: {name}")),
        },
      })
      .collect();

    PurgeReport { buckets }
  }
}
