use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::push::{PushSubscription, SubscriptionKeys};

/// Published base URL of the story API.
pub const DEFAULT_API_URL: &str = "https://story-api.dicoding.dev/v1";

/// Public application server key the API signs its pushes with.
const DEFAULT_VAPID_PUBLIC_KEY: &str =
  "BCCs2eonMI-6H2ctvFaWg-UYdDv387Vno_bzUzALpB442r2lCnsHmtrx8biyPi_E-1fSGABK_Qs_GlvPoJJqxbk";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub push: PushConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api: ApiConfig::default(),
      push: PushConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_API_URL.to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushConfig {
  pub vapid_public_key: String,
  /// Delivery endpoint for this device, issued by a push relay.
  pub endpoint: Option<String>,
  pub p256dh: Option<String>,
  pub auth: Option<String>,
}

impl Default for PushConfig {
  fn default() -> Self {
    Self {
      vapid_public_key: DEFAULT_VAPID_PUBLIC_KEY.to_string(),
      endpoint: None,
      p256dh: None,
      auth: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./tales.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/tales/config.yaml
  ///
  /// With no file anywhere the defaults apply; the public API needs no
  /// configuration to talk to.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("tales.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("tales").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  pub fn api_url(&self) -> Result<Url> {
    Url::parse(&self.api.url).map_err(|e| eyre!("Invalid API url '{}': {}", self.api.url, e))
  }

  /// The push descriptor for this device, if fully configured.
  pub fn push_subscription(&self) -> Option<PushSubscription> {
    match (&self.push.endpoint, &self.push.p256dh, &self.push.auth) {
      (Some(endpoint), Some(p256dh), Some(auth)) => Some(PushSubscription {
        endpoint: endpoint.clone(),
        keys: SubscriptionKeys {
          p256dh: p256dh.clone(),
          auth: auth.clone(),
        },
      }),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_point_at_the_public_api() {
    let config = Config::default();
    assert_eq!(config.api.url, DEFAULT_API_URL);
    assert!(config.api_url().is_ok());
    assert!(config.push_subscription().is_none());
  }

  #[test]
  fn test_partial_yaml_keeps_defaults() {
    let config: Config = serde_yaml::from_str("api:\n  url: https://stories.local/v2\n").unwrap();
    assert_eq!(config.api.url, "https://stories.local/v2");
    assert_eq!(config.push.vapid_public_key, DEFAULT_VAPID_PUBLIC_KEY);
  }

  #[test]
  fn test_push_descriptor_requires_all_three_fields() {
    let config: Config = serde_yaml::from_str(
      "push:\n  endpoint: https://push.example/send/x\n  p256dh: pk\n",
    )
    .unwrap();
    assert!(config.push_subscription().is_none());

    let config: Config = serde_yaml::from_str(
      "push:\n  endpoint: https://push.example/send/x\n  p256dh: pk\n  auth: ak\n",
    )
    .unwrap();
    let subscription = config.push_subscription().unwrap();
    assert_eq!(subscription.keys.auth, "ak");
  }
}
