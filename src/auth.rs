//! Login, registration, and the logout purge handshake.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::client::StoryClient;
use crate::cache::RecordStorage;
use crate::error::Result;
use crate::gateway::{GatewayHandle, STORY_DETAIL_CACHE, STORY_LIST_CACHE};
use crate::session::{Session, SessionStore};
use crate::validate;

pub struct AuthFlow<S: SessionStore, R: RecordStorage> {
  client: StoryClient,
  sessions: Arc<S>,
  storage: Arc<R>,
  gateway: GatewayHandle,
}

impl<S: SessionStore, R: RecordStorage> AuthFlow<S, R> {
  pub fn new(
    client: StoryClient,
    sessions: Arc<S>,
    storage: Arc<R>,
    gateway: GatewayHandle,
  ) -> Self {
    Self {
      client,
      sessions,
      storage,
      gateway,
    }
  }

  pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<()> {
    if name.trim().is_empty() {
      return Err(crate::error::Error::Validation("name must not be empty".into()));
    }
    validate::check_email(email)?;
    validate::check_password(password)?;
    self.client.register(name, email, password).await
  }

  /// Log in and persist the session. Caches are left alone; they warm up
  /// again on the first reads.
  pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
    validate::check_email(email)?;
    let session = self.client.login(email, password).await?;
    self.sessions.set(&session)?;
    Ok(session)
  }

  /// Log out. The session is cleared first; then the gateway buckets and
  /// the local store are purged best-effort. Cleanup failures are logged and
  /// never surface - from the caller's perspective logout cannot fail.
  pub async fn logout(&self) {
    if let Err(err) = self.sessions.clear() {
      warn!("failed to clear session state: {err}");
    }

    match self
      .gateway
      .purge(&[STORY_LIST_CACHE, STORY_DETAIL_CACHE])
      .await
    {
      Ok(report) if report.is_success() => info!("cache buckets purged"),
      Ok(report) => warn!(
        "cache purge reported an error: {}",
        report.error().unwrap_or_default()
      ),
      Err(err) => warn!("cache purge request failed: {err}"),
    }

    if let Err(err) = self.storage.clear() {
      warn!("failed to clear local story store: {err}");
    }
  }

  pub fn current_session(&self) -> Result<Option<Session>> {
    self.sessions.get()
  }
}
