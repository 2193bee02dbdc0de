//! Error taxonomy for the client data plane.
//!
//! `Transport` and `Api` are caught at the resilient-read boundary and turn
//! into a fallback to the local store; `Storage` means "no cached data";
//! `Validation` is raised before any network traffic happens.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  /// Network unreachable, timeout, or the response body could not be read.
  #[error("network error: {0}")]
  Transport(String),

  /// The server answered with a non-success status and a message.
  #[error("api error ({status}): {message}")]
  Api { status: u16, message: String },

  /// The local store is unavailable or rejected the operation.
  #[error("storage error: {0}")]
  Storage(String),

  /// Input rejected before submission.
  #[error("invalid input: {0}")]
  Validation(String),
}

impl From<reqwest::Error> for Error {
  fn from(err: reqwest::Error) -> Self {
    Error::Transport(err.to_string())
  }
}

// A body that does not decode is treated like a failed transfer: the caller
// falls back to the local store exactly as it would on a dropped connection.
impl From<serde_json::Error> for Error {
  fn from(err: serde_json::Error) -> Self {
    Error::Transport(format!("failed to decode response: {err}"))
  }
}
