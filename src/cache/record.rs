//! Core types for cached documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The last successfully fetched document for one storage key.
///
/// `validator` is the server's `ETag` for exactly this `data`; the two are
/// always written together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
  pub data: Value,
  pub validator: Option<String>,
}

impl CacheRecord {
  pub fn new(data: Value, validator: Option<String>) -> Self {
    Self { data, validator }
  }
}

/// A record as read back from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
  pub record: CacheRecord,
  /// When the record was last written
  pub cached_at: DateTime<Utc>,
}

/// Result of a load, including where the document came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
  /// The parsed document
  pub data: Value,
  /// Where the document came from
  pub source: LoadSource,
}

impl Loaded {
  /// A document freshly downloaded and written to the store.
  pub fn from_network(data: Value) -> Self {
    Self {
      data,
      source: LoadSource::Network,
    }
  }

  /// A cached document the server confirmed as current.
  pub fn from_cache(data: Value) -> Self {
    Self {
      data,
      source: LoadSource::Cache,
    }
  }
}

/// Indicates where loaded data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
  /// Server sent a new body (200)
  Network,
  /// Server answered 304, cached copy served
  Cache,
}

impl std::fmt::Display for LoadSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Network => write!(f, "network"),
      Self::Cache => write!(f, "cache"),
    }
  }
}
