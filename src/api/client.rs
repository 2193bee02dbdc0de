//! The story API client. Every request is routed through the cache gateway.

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::gateway::{GatewayHandle, GatewayRequest, GatewayResponse};
use crate::push::PushSubscription;
use crate::session::Session;

use super::api_types::{
  ApiEnvelope, ApiLoginResponse, ApiStory, ApiStoryDetailResponse, ApiStoryListResponse,
};
use super::endpoints::Endpoints;
use super::types::{NewStory, Story};

#[derive(Clone)]
pub struct StoryClient {
  endpoints: Endpoints,
  gateway: GatewayHandle,
}

impl StoryClient {
  pub fn new(base: &Url, gateway: GatewayHandle) -> Result<Self> {
    Ok(Self {
      endpoints: Endpoints::new(base)?,
      gateway,
    })
  }

  /// Create a new account.
  pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<()> {
    let body = serde_json::json!({
      "name": name,
      "email": email,
      "password": password,
    });
    self
      .execute::<ApiEnvelope>(GatewayRequest::post_json(self.endpoints.register.clone(), body))
      .await?;
    Ok(())
  }

  /// Exchange credentials for a session.
  pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
    let body = serde_json::json!({
      "email": email,
      "password": password,
    });
    let response: ApiLoginResponse = self
      .execute(GatewayRequest::post_json(self.endpoints.login.clone(), body))
      .await?;

    Ok(Session {
      token: response.login_result.token,
      user_id: response.login_result.user_id,
      name: response.login_result.name,
    })
  }

  /// Fetch one page of the story feed.
  pub async fn list_stories(
    &self,
    token: &str,
    page: u32,
    size: u32,
    location: bool,
  ) -> Result<Vec<Story>> {
    let url = self.endpoints.stories_page(page, size, location);
    let response: ApiStoryListResponse = self
      .execute(GatewayRequest::get(url).with_bearer(token))
      .await?;

    Ok(
      response
        .list_story
        .into_iter()
        .map(ApiStory::into_story)
        .collect(),
    )
  }

  /// Fetch one story by id.
  pub async fn get_story(&self, token: &str, id: &str) -> Result<Story> {
    let url = self.endpoints.story(id);
    let response: ApiStoryDetailResponse = self
      .execute(GatewayRequest::get(url).with_bearer(token))
      .await?;

    Ok(response.story.into_story())
  }

  /// Publish a story. The draft is validated before anything is sent.
  pub async fn add_story(&self, token: &str, story: NewStory) -> Result<()> {
    let form = story.into_form()?;
    self
      .execute::<ApiEnvelope>(
        GatewayRequest::post_form(self.endpoints.stories.clone(), form).with_bearer(token),
      )
      .await?;
    Ok(())
  }

  /// Publish a story anonymously.
  pub async fn add_story_guest(&self, story: NewStory) -> Result<()> {
    let form = story.into_form()?;
    self
      .execute::<ApiEnvelope>(GatewayRequest::post_form(
        self.endpoints.stories_guest.clone(),
        form,
      ))
      .await?;
    Ok(())
  }

  /// Download a story photo. Photos live on arbitrary hosts, so the request
  /// is matched by destination, not URL.
  pub async fn download_photo(&self, photo_url: &str) -> Result<Vec<u8>> {
    let url = Url::parse(photo_url)
      .map_err(|e| Error::Validation(format!("invalid photo url '{photo_url}': {e}")))?;
    let response = self.gateway.fetch(GatewayRequest::get(url).image()).await?;
    if !response.is_success() {
      return Err(Error::Api {
        status: response.status,
        message: "photo download failed".into(),
      });
    }
    Ok(response.body)
  }

  /// Register a push subscription with the server.
  pub async fn subscribe_push(&self, token: &str, subscription: &PushSubscription) -> Result<()> {
    let body = serde_json::json!({
      "endpoint": subscription.endpoint,
      "keys": {
        "p256dh": subscription.keys.p256dh,
        "auth": subscription.keys.auth,
      },
    });
    self
      .execute::<ApiEnvelope>(
        GatewayRequest::post_json(self.endpoints.notifications_subscribe.clone(), body)
          .with_bearer(token),
      )
      .await?;
    Ok(())
  }

  /// Tell the server to stop pushing to an endpoint.
  pub async fn unsubscribe_push(&self, token: &str, endpoint: &str) -> Result<()> {
    let body = serde_json::json!({ "endpoint": endpoint });
    self
      .execute::<ApiEnvelope>(
        GatewayRequest::delete_json(self.endpoints.notifications_subscribe.clone(), body)
          .with_bearer(token),
      )
      .await?;
    Ok(())
  }

  async fn execute<T: DeserializeOwned>(&self, request: GatewayRequest) -> Result<T> {
    let response = self.gateway.fetch(request).await?;
    decode(&response)
  }
}

/// Decode a gateway response, turning non-success statuses into `Error::Api`
/// carrying the server's message.
fn decode<T: DeserializeOwned>(response: &GatewayResponse) -> Result<T> {
  if !response.is_success() {
    let message = serde_json::from_slice::<ApiEnvelope>(&response.body)
      .ok()
      .map(|envelope| envelope.message)
      .filter(|message| !message.is_empty())
      .unwrap_or_else(|| "request failed".to_string());
    return Err(Error::Api {
      status: response.status,
      message,
    });
  }

  Ok(serde_json::from_slice(&response.body)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gateway::testing::ScriptedBackend;
  use crate::gateway::Method;
  use std::sync::Arc;

  fn client(backend: Arc<ScriptedBackend>) -> StoryClient {
    let base = Url::parse("https://api.example/v1").unwrap();
    let gateway = GatewayHandle::spawn(backend, &base);
    StoryClient::new(&base, gateway).unwrap()
  }

  #[tokio::test]
  async fn test_login_builds_a_session() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_ok(
      200,
      r#"{"error":false,"message":"ok","loginResult":{"userId":"user-1","name":"Rani","token":"tok-1"}}"#,
    );
    let client = client(backend.clone());

    let session = client.login("rani@example.com", "password1").await.unwrap();

    assert_eq!(session.user_id, "user-1");
    assert_eq!(session.token, "tok-1");
    let requests = backend.requests();
    assert_eq!(requests[0].0, Method::Post);
    assert!(requests[0].1.ends_with("/login"));
  }

  #[tokio::test]
  async fn test_non_success_surfaces_the_server_message() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_ok(401, r#"{"error":true,"message":"Missing authentication"}"#);
    let client = client(backend);

    let err = client.list_stories("bad-token", 1, 10, false).await.unwrap_err();

    match err {
      Error::Api { status, message } => {
        assert_eq!(status, 401);
        assert_eq!(message, "Missing authentication");
      }
      other => panic!("expected Api error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_unparseable_error_body_gets_a_fallback_message() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_ok(502, "<html>bad gateway</html>");
    let client = client(backend);

    let err = client.get_story("tok", "s1").await.unwrap_err();

    match err {
      Error::Api { status, message } => {
        assert_eq!(status, 502);
        assert_eq!(message, "request failed");
      }
      other => panic!("expected Api error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_invalid_draft_never_reaches_the_network() {
    let backend = Arc::new(ScriptedBackend::new());
    let client = client(backend.clone());

    let draft = NewStory {
      description: "pdf masquerading as a photo".into(),
      photo_name: "doc.pdf".into(),
      photo: b"%PDF-1.4 ...".to_vec(),
      lat: None,
      lon: None,
    };
    let err = client.add_story("tok", draft).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(backend.request_count(), 0);
  }
}
