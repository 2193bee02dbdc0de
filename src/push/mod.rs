//! Push notifications: subscription lifecycle and payload rendering.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::client::StoryClient;
use crate::error::{Error, Result};
use crate::session::SessionStore;

/// The descriptor exchanged with the remote API: where to push and the keys
/// to encrypt with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
  pub endpoint: String,
  pub keys: SubscriptionKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
  pub p256dh: String,
  pub auth: String,
}

/// Subscription lifecycle. Transitions run through the two transient states;
/// a failed transition settles back on the state that matches reality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
  Unsubscribed,
  Subscribing,
  Subscribed,
  Unsubscribing,
}

/// The platform push registration seam.
#[async_trait]
pub trait PushService: Send + Sync {
  /// Create a subscription bound to the given application server key.
  async fn subscribe(&self, application_server_key: &[u8]) -> Result<PushSubscription>;

  /// The currently active subscription, if any.
  async fn subscription(&self) -> Result<Option<PushSubscription>>;

  /// Cancel the active subscription. `Ok(false)` means the cancellation did
  /// not take effect.
  async fn unsubscribe(&self) -> Result<bool>;
}

/// Decode a base64url application server key, tolerating both padded and
/// unpadded forms.
pub fn decode_server_key(key: &str) -> Result<Vec<u8>> {
  URL_SAFE_NO_PAD
    .decode(key.trim_end_matches('='))
    .map_err(|e| Error::Validation(format!("invalid application server key: {e}")))
}

pub struct PushManager<P: PushService, S: SessionStore> {
  service: P,
  client: StoryClient,
  sessions: Arc<S>,
  server_key: String,
  state: SubscriptionState,
}

impl<P: PushService, S: SessionStore> PushManager<P, S> {
  pub fn new(service: P, client: StoryClient, sessions: Arc<S>, server_key: &str) -> Self {
    Self {
      service,
      client,
      sessions,
      server_key: server_key.to_string(),
      state: SubscriptionState::Unsubscribed,
    }
  }

  pub fn state(&self) -> SubscriptionState {
    self.state
  }

  /// Subscribe and register the subscription with the remote API.
  ///
  /// An already-present subscription is dropped first so the server never
  /// holds two descriptors for this device; that cleanup is best-effort.
  pub async fn subscribe(&mut self) -> Result<PushSubscription> {
    let token = self.require_token()?;
    self.state = SubscriptionState::Subscribing;

    match self.service.subscription().await {
      Ok(Some(_)) => {
        if let Err(err) = self.service.unsubscribe().await {
          warn!("failed to drop previous push subscription: {err}");
        }
      }
      Ok(None) => {}
      Err(err) => warn!("could not inspect existing push subscription: {err}"),
    }

    let result = self.subscribe_inner(&token).await;
    match result {
      Ok(subscription) => {
        self.state = SubscriptionState::Subscribed;
        info!("push subscription registered");
        Ok(subscription)
      }
      Err(err) => {
        self.state = SubscriptionState::Unsubscribed;
        Err(err)
      }
    }
  }

  async fn subscribe_inner(&self, token: &str) -> Result<PushSubscription> {
    let key = decode_server_key(&self.server_key)?;
    let subscription = self.service.subscribe(&key).await?;
    self.client.subscribe_push(token, &subscription).await?;
    Ok(subscription)
  }

  /// Cancel the subscription locally, and only on local success tell the
  /// remote API to drop it.
  pub async fn unsubscribe(&mut self) -> Result<()> {
    let token = self.require_token()?;
    self.state = SubscriptionState::Unsubscribing;

    let existing = match self.service.subscription().await {
      Ok(existing) => existing,
      Err(err) => {
        self.state = SubscriptionState::Subscribed;
        return Err(err);
      }
    };

    let Some(subscription) = existing else {
      info!("no active push subscription");
      self.state = SubscriptionState::Unsubscribed;
      return Ok(());
    };

    match self.service.unsubscribe().await {
      Ok(true) => {
        let result = self.client.unsubscribe_push(&token, &subscription.endpoint).await;
        self.state = SubscriptionState::Unsubscribed;
        result
      }
      Ok(false) => {
        self.state = SubscriptionState::Subscribed;
        Err(Error::Transport("push service refused to cancel the subscription".into()))
      }
      Err(err) => {
        self.state = SubscriptionState::Subscribed;
        Err(err)
      }
    }
  }

  fn require_token(&self) -> Result<String> {
    match self.sessions.get()? {
      Some(session) => Ok(session.token),
      None => Err(Error::Validation("not logged in".into())),
    }
  }
}

// ============================================================================
// Incoming payloads
// ============================================================================

/// Push payload as produced by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
  pub title: String,
  pub options: PushOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOptions {
  #[serde(default)]
  pub body: String,
  #[serde(default)]
  pub icon: String,
  #[serde(default)]
  pub badge: String,
}

impl PushPayload {
  /// Parse incoming push data; an absent or malformed payload falls back to
  /// the fixed default.
  pub fn parse(data: Option<&[u8]>) -> Self {
    data
      .and_then(|bytes| serde_json::from_slice(bytes).ok())
      .unwrap_or_else(Self::default_payload)
  }

  fn default_payload() -> Self {
    Self {
      title: "New Story".into(),
      options: PushOptions {
        body: "A new story has been created".into(),
        icon: "/images/icon-192.png".into(),
        badge: "/images/icon-192.png".into(),
      },
    }
  }
}

/// Whatever renders notifications to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn show(&self, payload: &PushPayload) -> Result<()>;
}

/// Render one incoming push event. The event is held open until the notifier
/// settles; display failures are logged, never raised.
pub async fn deliver(data: Option<&[u8]>, notifier: &dyn Notifier) {
  let payload = PushPayload::parse(data);
  if let Err(err) = notifier.show(&payload).await {
    warn!("failed to display notification: {err}");
  }
}

/// Notifier that writes to standard output; terminal sessions have no
/// notification center hook.
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
  async fn show(&self, payload: &PushPayload) -> Result<()> {
    println!("{}: {}", payload.title, payload.options.body);
    Ok(())
  }
}

// ============================================================================
// File-backed push service
// ============================================================================

/// Push registration backed by a state file: the descriptor from the config
/// is "active" while the file exists. Stands in for the platform push
/// manager on a terminal.
pub struct FilePushService {
  path: PathBuf,
  descriptor: PushSubscription,
}

impl FilePushService {
  /// Open at the default state-file location.
  pub fn open(descriptor: PushSubscription) -> Result<Self> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::Storage("could not determine data directory".into()))?;

    Ok(Self::at(data_dir.join("tales").join("push.json"), descriptor))
  }

  pub fn at(path: impl Into<PathBuf>, descriptor: PushSubscription) -> Self {
    Self {
      path: path.into(),
      descriptor,
    }
  }
}

#[async_trait]
impl PushService for FilePushService {
  async fn subscribe(&self, _application_server_key: &[u8]) -> Result<PushSubscription> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Storage(format!("failed to create data directory: {e}")))?;
    }
    let contents = serde_json::to_string_pretty(&self.descriptor)
      .map_err(|e| Error::Storage(format!("failed to serialize subscription: {e}")))?;
    std::fs::write(&self.path, contents)
      .map_err(|e| Error::Storage(format!("failed to write subscription state: {e}")))?;
    Ok(self.descriptor.clone())
  }

  async fn subscription(&self) -> Result<Option<PushSubscription>> {
    if !self.path.exists() {
      return Ok(None);
    }
    let contents = std::fs::read_to_string(&self.path)
      .map_err(|e| Error::Storage(format!("failed to read subscription state: {e}")))?;
    let subscription = serde_json::from_str(&contents)
      .map_err(|e| Error::Storage(format!("failed to parse subscription state: {e}")))?;
    Ok(Some(subscription))
  }

  async fn unsubscribe(&self) -> Result<bool> {
    if !self.path.exists() {
      return Ok(false);
    }
    std::fs::remove_file(&self.path)
      .map_err(|e| Error::Storage(format!("failed to remove subscription state: {e}")))?;
    Ok(true)
  }
}
