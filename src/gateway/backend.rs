//! Request/response shapes crossing the gateway channel, and the HTTP
//! backend that actually executes them.

use async_trait::async_trait;
use reqwest::multipart;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{Error, Result};

/// What kind of resource a request is for, in the sense a browser tags
/// request destinations. Image requests are matched by destination rather
/// than by URL because photos live on arbitrary hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
  Api,
  Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Post,
  Delete,
}

/// Multipart payload for publishing a story.
#[derive(Debug, Clone)]
pub struct StoryForm {
  pub description: String,
  pub photo_name: String,
  pub photo_mime: String,
  pub photo: Vec<u8>,
  pub lat: Option<f64>,
  pub lon: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
  Json(serde_json::Value),
  StoryForm(StoryForm),
}

/// One outbound request, as plain data so it can cross the channel into the
/// gateway task.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
  pub method: Method,
  pub url: Url,
  pub bearer: Option<String>,
  pub body: Option<RequestBody>,
  pub destination: Destination,
}

impl GatewayRequest {
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::Get,
      url,
      bearer: None,
      body: None,
      destination: Destination::Api,
    }
  }

  pub fn post_json(url: Url, body: serde_json::Value) -> Self {
    Self {
      method: Method::Post,
      url,
      bearer: None,
      body: Some(RequestBody::Json(body)),
      destination: Destination::Api,
    }
  }

  pub fn delete_json(url: Url, body: serde_json::Value) -> Self {
    Self {
      method: Method::Delete,
      url,
      bearer: None,
      body: Some(RequestBody::Json(body)),
      destination: Destination::Api,
    }
  }

  pub fn post_form(url: Url, form: StoryForm) -> Self {
    Self {
      method: Method::Post,
      url,
      bearer: None,
      body: Some(RequestBody::StoryForm(form)),
      destination: Destination::Api,
    }
  }

  pub fn with_bearer(mut self, token: &str) -> Self {
    self.bearer = Some(token.to_string());
    self
  }

  /// Tag this request as an image fetch.
  pub fn image(mut self) -> Self {
    self.destination = Destination::Image;
    self
  }

  /// Stable cache-entry key: cached responses are keyed by URL, like a
  /// browser cache.
  pub fn cache_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.url.as_str().as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A completed transfer. Transport failures never produce one of these;
/// non-success statuses do.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

impl GatewayResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// The network side of the gateway.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
  async fn execute(&self, request: &GatewayRequest) -> Result<GatewayResponse>;
}

/// Backend that performs real HTTP transfers.
pub struct HttpBackend {
  http: reqwest::Client,
}

impl HttpBackend {
  pub fn new() -> Result<Self> {
    let http = reqwest::Client::builder().build()?;
    Ok(Self { http })
  }
}

#[async_trait]
impl Backend for HttpBackend {
  async fn execute(&self, request: &GatewayRequest) -> Result<GatewayResponse> {
    let mut builder = match request.method {
      Method::Get => self.http.get(request.url.clone()),
      Method::Post => self.http.post(request.url.clone()),
      Method::Delete => self.http.delete(request.url.clone()),
    };

    if let Some(token) = &request.bearer {
      builder = builder.bearer_auth(token);
    }

    match &request.body {
      Some(RequestBody::Json(value)) => {
        builder = builder.json(value);
      }
      Some(RequestBody::StoryForm(form)) => {
        let part = multipart::Part::bytes(form.photo.clone())
          .file_name(form.photo_name.clone())
          .mime_str(&form.photo_mime)
          .map_err(|e| Error::Validation(format!("unusable photo type: {e}")))?;
        let mut multipart = multipart::Form::new()
          .text("description", form.description.clone())
          .part("photo", part);
        if let (Some(lat), Some(lon)) = (form.lat, form.lon) {
          multipart = multipart
            .text("lat", lat.to_string())
            .text("lon", lon.to_string());
        }
        builder = builder.multipart(multipart);
      }
      None => {}
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();

    Ok(GatewayResponse { status, body })
  }
}

#[cfg(test)]
pub mod testing {
  //! Scripted backend for driving the gateway without a network.

  use std::collections::VecDeque;
  use std::sync::Mutex;

  use super::*;

  pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<GatewayResponse>>>,
    log: Mutex<Vec<(Method, String)>>,
  }

  impl ScriptedBackend {
    pub fn new() -> Self {
      Self {
        responses: Mutex::new(VecDeque::new()),
        log: Mutex::new(Vec::new()),
      }
    }

    /// Queue a response with the given status and body.
    pub fn push_ok(&self, status: u16, body: &str) {
      self.responses.lock().unwrap().push_back(Ok(GatewayResponse {
        status,
        body: body.as_bytes().to_vec(),
      }));
    }

    /// Queue a transport failure.
    pub fn push_err(&self, message: &str) {
      self
        .responses
        .lock()
        .unwrap()
        .push_back(Err(Error::Transport(message.to_string())));
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<(Method, String)> {
      self.log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
      self.log.lock().unwrap().len()
    }
  }

  #[async_trait]
  impl Backend for ScriptedBackend {
    async fn execute(&self, request: &GatewayRequest) -> Result<GatewayResponse> {
      self
        .log
        .lock()
        .unwrap()
        .push((request.method, request.url.to_string()));
      self
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(Error::Transport("no scripted response left".into())))
    }
  }
}
