//! Serde-deserializable types matching the story API's response bodies.
//!
//! These are separate from the domain types so wire quirks (camelCase names,
//! stray coordinate fields) stay at the boundary.

use serde::Deserialize;

use super::types::Story;

// ============================================================================
// Generic envelope
// ============================================================================

/// Every response carries this shape; `message` is what the server wants the
/// user to see on failure.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
  #[serde(default)]
  pub error: bool,
  #[serde(default)]
  pub message: String,
}

// ============================================================================
// Stories
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiStory {
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(rename = "photoUrl", default)]
  pub photo_url: String,
  #[serde(rename = "createdAt", default)]
  pub created_at: String,
  pub lat: Option<f64>,
  pub lon: Option<f64>,
}

impl ApiStory {
  pub fn into_story(self) -> Story {
    // A lone coordinate is as useless as none; normalize to the pair-or-
    // nothing invariant.
    let (lat, lon) = match (self.lat, self.lon) {
      (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
      _ => (None, None),
    };

    Story {
      id: self.id,
      name: self.name,
      description: self.description,
      photo_url: self.photo_url,
      created_at: self.created_at,
      lat,
      lon,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiStoryListResponse {
  #[serde(rename = "listStory", default)]
  pub list_story: Vec<ApiStory>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStoryDetailResponse {
  pub story: ApiStory,
}

// ============================================================================
// Authentication
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiLoginResponse {
  #[serde(rename = "loginResult")]
  pub login_result: ApiLoginResult,
}

#[derive(Debug, Deserialize)]
pub struct ApiLoginResult {
  #[serde(rename = "userId")]
  pub user_id: String,
  pub name: String,
  pub token: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_story_list() {
    let body = r#"{
      "error": false,
      "message": "Stories fetched successfully",
      "listStory": [
        {
          "id": "story-s1",
          "name": "Rani",
          "description": "hills at dawn",
          "photoUrl": "https://cdn.example/photos/s1.jpg",
          "createdAt": "2024-05-01T08:00:00.000Z",
          "lat": -6.2,
          "lon": 106.8
        },
        {
          "id": "story-s2",
          "name": "Budi",
          "description": "no location",
          "photoUrl": "https://cdn.example/photos/s2.jpg",
          "createdAt": "2024-05-02T08:00:00.000Z"
        }
      ]
    }"#;

    let response: ApiStoryListResponse = serde_json::from_str(body).unwrap();
    assert_eq!(response.list_story.len(), 2);

    let first = response.list_story.into_iter().next().unwrap().into_story();
    assert_eq!(first.id, "story-s1");
    assert_eq!(first.lat, Some(-6.2));
  }

  #[test]
  fn test_lone_coordinate_is_dropped() {
    let body = r#"{
      "id": "story-s3",
      "name": "Sari",
      "description": "half a location",
      "photoUrl": "https://cdn.example/photos/s3.jpg",
      "createdAt": "2024-05-03T08:00:00.000Z",
      "lat": -6.2
    }"#;

    let story = serde_json::from_str::<ApiStory>(body).unwrap().into_story();
    assert_eq!(story.lat, None);
    assert_eq!(story.lon, None);
  }

  #[test]
  fn test_parse_login_result() {
    let body = r#"{
      "error": false,
      "message": "success",
      "loginResult": {
        "userId": "user-1",
        "name": "Rani",
        "token": "eyJhbGciOi"
      }
    }"#;

    let response: ApiLoginResponse = serde_json::from_str(body).unwrap();
    assert_eq!(response.login_result.user_id, "user-1");
    assert_eq!(response.login_result.token, "eyJhbGciOi");
  }

  #[test]
  fn test_parse_error_envelope() {
    let body = r#"{"error": true, "message": "User not found"}"#;

    let envelope: ApiEnvelope = serde_json::from_str(body).unwrap();
    assert!(envelope.error);
    assert_eq!(envelope.message, "User not found");
  }
}
