//! Wiring and command dispatch.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::api::cached_client::CachedStoryClient;
use crate::api::client::StoryClient;
use crate::api::types::{NewStory, Story};
use crate::auth::AuthFlow;
use crate::cache::{DataSource, FetchResult, SqliteStorage};
use crate::config::Config;
use crate::gateway::{GatewayHandle, HttpBackend};
use crate::push::{FilePushService, PushManager, StdoutNotifier};
use crate::session::{FileSessionStore, Session, SessionStore};
use crate::Command;

/// The assembled application: one gateway task, one local store, one session
/// store, and the clients on top of them.
pub struct App {
  config: Config,
  sessions: Arc<FileSessionStore>,
  client: StoryClient,
  cached: CachedStoryClient,
  auth: AuthFlow<FileSessionStore, SqliteStorage>,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let api_url = config.api_url()?;

    let backend = Arc::new(HttpBackend::new()?);
    let gateway = GatewayHandle::spawn(backend, &api_url);
    let storage = Arc::new(SqliteStorage::open()?);
    let sessions = Arc::new(FileSessionStore::open()?);
    let client = StoryClient::new(&api_url, gateway.clone())?;
    let cached = CachedStoryClient::new(client.clone(), Arc::clone(&storage));
    let auth = AuthFlow::new(
      client.clone(),
      Arc::clone(&sessions),
      storage,
      gateway,
    );

    Ok(Self {
      config,
      sessions,
      client,
      cached,
      auth,
    })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Register {
        name,
        email,
        password,
      } => {
        self.auth.register(&name, &email, &password).await?;
        println!("Registered. You can now log in.");
      }
      Command::Login { email, password } => {
        let session = self.auth.login(&email, &password).await?;
        println!("Logged in as {} ({})", session.name, session.user_id);
      }
      Command::Logout => {
        self.auth.logout().await;
        println!("Logged out.");
      }
      Command::List {
        page,
        size,
        location,
      } => {
        let session = self.require_session()?;
        let result = self.cached.fetch_list(&session.token, page, size, location).await;
        let stories = unwrap_result(result)?;
        for story in &stories {
          let place = match (story.lat, story.lon) {
            (Some(lat), Some(lon)) => format!("  @({lat:.4}, {lon:.4})"),
            _ => String::new(),
          };
          println!("{}  {}  {}{}", story.id, story.name, first_line(&story.description), place);
        }
        if stories.is_empty() {
          println!("No stories.");
        }
      }
      Command::Detail { id, save_photo } => {
        let session = self.require_session()?;
        let result = self.cached.fetch_detail(&session.token, &id).await;
        let story = unwrap_result(result)?;
        print_story(&story);
        if let Some(path) = save_photo {
          let bytes = self.client.download_photo(&story.photo_url).await?;
          std::fs::write(&path, bytes)
            .map_err(|e| eyre!("Failed to write photo to {}: {}", path.display(), e))?;
          println!("Photo saved to {}", path.display());
        }
      }
      Command::Add {
        description,
        photo,
        lat,
        lon,
        guest,
      } => {
        let bytes = std::fs::read(&photo)
          .map_err(|e| eyre!("Failed to read photo {}: {}", photo.display(), e))?;
        let photo_name = photo
          .file_name()
          .and_then(|name| name.to_str())
          .unwrap_or("photo")
          .to_string();
        let draft = NewStory {
          description,
          photo_name,
          photo: bytes,
          lat,
          lon,
        };
        if guest {
          self.client.add_story_guest(draft).await?;
        } else {
          let session = self.require_session()?;
          self.client.add_story(&session.token, draft).await?;
        }
        println!("Story published.");
      }
      Command::Subscribe => {
        let mut manager = self.push_manager()?;
        let subscription = manager.subscribe().await?;
        println!("Subscribed to push notifications ({})", subscription.endpoint);
      }
      Command::Unsubscribe => {
        let mut manager = self.push_manager()?;
        manager.unsubscribe().await?;
        println!("Push subscription removed.");
      }
      Command::Notify { payload } => {
        let data = payload.as_ref().map(|p| p.as_bytes());
        crate::push::deliver(data, &StdoutNotifier).await;
      }
    }

    Ok(())
  }

  fn require_session(&self) -> Result<Session> {
    self
      .sessions
      .get()?
      .ok_or_else(|| eyre!("Not logged in. Run `tales login` first."))
  }

  fn push_manager(&self) -> Result<PushManager<FilePushService, FileSessionStore>> {
    let descriptor = self.config.push_subscription().ok_or_else(|| {
      eyre!(
        "Push is not configured. Set push.endpoint, push.p256dh, and push.auth \
         in the config file."
      )
    })?;
    let service = FilePushService::open(descriptor)?;
    Ok(PushManager::new(
      service,
      self.client.clone(),
      Arc::clone(&self.sessions),
      &self.config.push.vapid_public_key,
    ))
  }
}

/// Turn a fetch envelope into printable data, noting when it came from the
/// offline copy.
fn unwrap_result<T>(result: FetchResult<T>) -> Result<T> {
  if result.source == DataSource::Cache {
    println!("(offline copy - the network was unreachable)");
  }
  match result.data {
    Some(data) => Ok(data),
    None => Err(eyre!(
      result
        .error
        .unwrap_or_else(|| "no data available".to_string())
    )),
  }
}

fn print_story(story: &Story) {
  println!("{}  by {}", story.id, story.name);
  println!("created: {}", story.created_at);
  if let (Some(lat), Some(lon)) = (story.lat, story.lon) {
    println!("location: {lat:.4}, {lon:.4}");
  }
  println!("photo: {}", story.photo_url);
  println!();
  println!("{}", story.description);
}

fn first_line(text: &str) -> &str {
  text.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_first_line_truncates_multiline_descriptions() {
    assert_eq!(first_line("one\ntwo"), "one");
    assert_eq!(first_line(""), "");
  }
}
