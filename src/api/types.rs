//! Domain types for the story API.

use serde::{Deserialize, Serialize};

use crate::cache::Cacheable;
use crate::error::{Error, Result};
use crate::gateway::StoryForm;
use crate::validate;

/// A published story. Stories are immutable; the store only ever inserts or
/// replaces them wholesale by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
  pub id: String,
  /// Author display name.
  pub name: String,
  pub description: String,
  pub photo_url: String,
  pub created_at: String,
  /// Coordinates are carried as a pair or not at all.
  pub lat: Option<f64>,
  pub lon: Option<f64>,
}

impl Cacheable for Story {
  fn store_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "story"
  }
}

/// A story waiting to be published.
#[derive(Debug, Clone)]
pub struct NewStory {
  pub description: String,
  pub photo_name: String,
  pub photo: Vec<u8>,
  pub lat: Option<f64>,
  pub lon: Option<f64>,
}

impl NewStory {
  /// Validate the draft and turn it into an upload form. Runs entirely
  /// before any network traffic.
  pub fn into_form(self) -> Result<StoryForm> {
    if self.description.trim().is_empty() {
      return Err(Error::Validation("description must not be empty".into()));
    }
    if self.lat.is_some() != self.lon.is_some() {
      return Err(Error::Validation(
        "latitude and longitude must be given together".into(),
      ));
    }
    let photo_mime = validate::photo_mime(&self.photo)?.to_string();

    Ok(StoryForm {
      description: self.description,
      photo_name: self.photo_name,
      photo_mime,
      photo: self.photo,
      lat: self.lat,
      lon: self.lon,
    })
  }
}
