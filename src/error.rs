//! Error types for loading cached resources.
//!
//! Every failure of a load propagates to the caller unchanged; nothing here is
//! retried.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for load operations
pub type LoadResult<T> = Result<T, LoadError>;

/// All errors a load can fail with
#[derive(Error, Debug)]
pub enum LoadError {
  // Storage errors
  #[error("Durable store unavailable at {path}: {reason}")]
  StoreUnavailable { path: PathBuf, reason: String },

  #[error("Store operation failed: {0}")]
  Store(String),

  // Network errors
  #[error("Fetch failed: {status}")]
  FetchFailed { status: StatusCode },

  #[error("Transport error: {0}")]
  Transport(String),

  // Payload errors
  #[error("Response body is not valid UTF-8: {0}")]
  InvalidEncoding(#[source] std::str::Utf8Error),

  #[error("Response body is not valid JSON: {0}")]
  InvalidJson(#[source] serde_json::Error),

  // Caller errors
  #[error("Unknown resource: {0}")]
  UnknownResource(String),

  #[error("Server reported {0} not modified but no cached copy exists")]
  CacheInconsistent(String),
}

impl From<reqwest::Error> for LoadError {
  fn from(e: reqwest::Error) -> Self {
    Self::Transport(e.to_string())
  }
}

impl From<rusqlite::Error> for LoadError {
  fn from(e: rusqlite::Error) -> Self {
    Self::Store(e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fetch_failed_displays_status() {
    let err = LoadError::FetchFailed {
      status: StatusCode::NOT_FOUND,
    };
    assert_eq!(err.to_string(), "Fetch failed: 404 Not Found");
  }
}
