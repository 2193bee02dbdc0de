//! Endpoint catalog for the story API.

use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Endpoints {
  pub register: Url,
  pub login: Url,
  pub stories: Url,
  pub stories_guest: Url,
  pub notifications_subscribe: Url,
}

impl Endpoints {
  pub fn new(base: &Url) -> Result<Self> {
    let base = base.as_str().trim_end_matches('/');
    Ok(Self {
      register: parse(&format!("{base}/register"))?,
      login: parse(&format!("{base}/login"))?,
      stories: parse(&format!("{base}/stories"))?,
      stories_guest: parse(&format!("{base}/stories/guest"))?,
      notifications_subscribe: parse(&format!("{base}/notifications/subscribe"))?,
    })
  }

  /// Story list with pagination and the location filter.
  pub fn stories_page(&self, page: u32, size: u32, location: bool) -> Url {
    let mut url = self.stories.clone();
    url
      .query_pairs_mut()
      .append_pair("page", &page.to_string())
      .append_pair("size", &size.to_string())
      .append_pair("location", if location { "1" } else { "0" });
    url
  }

  /// Detail endpoint for one story.
  pub fn story(&self, id: &str) -> Url {
    let mut url = self.stories.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
      segments.push(id);
    }
    url
  }
}

fn parse(url: &str) -> Result<Url> {
  Url::parse(url).map_err(|e| Error::Validation(format!("invalid API url '{url}': {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn endpoints() -> Endpoints {
    Endpoints::new(&Url::parse("https://api.example/v1").unwrap()).unwrap()
  }

  #[test]
  fn test_trailing_slash_is_tolerated() {
    let with_slash = Endpoints::new(&Url::parse("https://api.example/v1/").unwrap()).unwrap();
    assert_eq!(with_slash.login.as_str(), endpoints().login.as_str());
  }

  #[test]
  fn test_list_url_carries_the_filters() {
    let url = endpoints().stories_page(2, 25, true);
    assert_eq!(
      url.as_str(),
      "https://api.example/v1/stories?page=2&size=25&location=1"
    );
  }

  #[test]
  fn test_detail_url_extends_the_list_url() {
    let url = endpoints().story("story-s1");
    assert_eq!(url.as_str(), "https://api.example/v1/stories/story-s1");
  }
}
