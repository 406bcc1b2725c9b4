//! Loader that ties the record store to conditional fetching.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::record::{CacheRecord, Loaded, StoredRecord};
use super::storage::RecordStore;
use crate::catalog::Catalog;
use crate::error::{LoadError, LoadResult};
use crate::fetch::{fetch_with_progress, FetchOutcome, Progress, Transport};

/// Loads catalog resources through a durable, ETag-revalidated cache.
///
/// Each load reads the cached record, asks the server whether it changed, and
/// either serves the cached copy (304) or stores and serves the new body.
/// Loads share no state beyond the store, so concurrent loads of the same
/// resource may both download and both write; the last write wins.
pub struct Loader<S: RecordStore, T: Transport> {
  catalog: Arc<Catalog>,
  store: Arc<S>,
  transport: Arc<T>,
}

impl<S: RecordStore, T: Transport> Loader<S, T> {
  pub fn new(catalog: Catalog, store: S, transport: T) -> Self {
    Self {
      catalog: Arc::new(catalog),
      store: Arc::new(store),
      transport: Arc::new(transport),
    }
  }

  pub fn catalog(&self) -> &Catalog {
    &self.catalog
  }

  /// Load a resource by name, returning only the document.
  pub async fn load(&self, name: &str, on_progress: Option<Progress<'_>>) -> LoadResult<Value> {
    self
      .load_with_source(name, on_progress)
      .await
      .map(|loaded| loaded.data)
  }

  /// Name of the resource served when a caller names none.
  pub fn default_name(&self) -> LoadResult<&str> {
    self
      .catalog
      .default_name()
      .ok_or_else(|| LoadError::UnknownResource("<default>".to_string()))
  }

  /// Load the catalog's default resource.
  pub async fn load_default(&self, on_progress: Option<Progress<'_>>) -> LoadResult<Loaded> {
    let name = self.default_name()?.to_string();
    self.load_with_source(&name, on_progress).await
  }

  /// Load a resource by name.
  ///
  /// 1. Resolve the name (no I/O happens for unknown names)
  /// 2. Read any cached record
  /// 3. Fetch, sending the cached validator
  /// 4. On 304, serve the cached document without writing
  /// 5. Otherwise store the new document with its validator and serve it
  #[instrument(skip(self, on_progress), level = "debug")]
  pub async fn load_with_source(
    &self,
    name: &str,
    on_progress: Option<Progress<'_>>,
  ) -> LoadResult<Loaded> {
    let resource = self.catalog.resolve(name)?;

    let cached = self.store.get(&resource.key).await?;
    let validator = cached
      .as_ref()
      .and_then(|c| c.record.validator.as_deref())
      .filter(|v| !v.is_empty());
    debug!(
      key = %resource.key,
      hit = cached.is_some(),
      validator = validator.unwrap_or(""),
      "Read cached record"
    );

    let outcome =
      fetch_with_progress(self.transport.as_ref(), &resource.url, on_progress, validator).await?;

    match outcome {
      FetchOutcome::NotModified => match cached {
        Some(stored) => {
          debug!(key = %resource.key, "Serving cached copy");
          Ok(Loaded::from_cache(stored.record.data))
        }
        None => {
          warn!(key = %resource.key, "Not modified without a cached copy");
          Err(LoadError::CacheInconsistent(name.to_string()))
        }
      },
      FetchOutcome::Fetched { data, validator } => {
        let record = CacheRecord::new(data, validator);
        self.store.put(&resource.key, &record).await?;
        Ok(Loaded::from_network(record.data))
      }
    }
  }

  /// The stored record for a resource, without touching the network.
  pub async fn cached(&self, name: &str) -> LoadResult<Option<StoredRecord>> {
    let resource = self.catalog.resolve(name)?;
    self.store.get(&resource.key).await
  }
}

impl<S: RecordStore, T: Transport> Clone for Loader<S, T> {
  fn clone(&self) -> Self {
    Self {
      catalog: Arc::clone(&self.catalog),
      store: Arc::clone(&self.store),
      transport: Arc::clone(&self.transport),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::record::LoadSource;
  use crate::cache::storage::memory::MemoryStore;
  use crate::cache::storage::SqliteStore;
  use crate::catalog::ResourceDescriptor;
  use crate::fetch::scripted::{Reply, ScriptedTransport};
  use reqwest::StatusCode;
  use serde_json::json;
  use std::collections::BTreeMap;

  const INFO_URL: &str = "https://data.example.org/gwasinfo.json";
  const BATCH_URL: &str = "https://data.example.org/gwasinfo_batches.json";

  fn catalog() -> Catalog {
    let mut resources = BTreeMap::new();
    resources.insert(
      "gwasinfo".to_string(),
      ResourceDescriptor::new("gwasinfo.json", INFO_URL),
    );
    resources.insert(
      "batches".to_string(),
      ResourceDescriptor::new("gwasinfo_batches.json", BATCH_URL),
    );
    Catalog::new(resources)
  }

  fn loader(
    store: MemoryStore,
    replies: impl IntoIterator<Item = Reply>,
  ) -> Loader<MemoryStore, ScriptedTransport> {
    Loader::new(catalog(), store, ScriptedTransport::new(replies))
  }

  #[tokio::test]
  async fn first_load_fetches_unconditionally_and_stores() {
    let body = json!({"ieu-a-2": {"trait": "Body mass index"}});
    let loader = loader(
      MemoryStore::default(),
      [Reply::json(&body, Some("\"v1\""))],
    );

    let data = loader.load("gwasinfo", None).await.unwrap();

    assert_eq!(data, body);
    let requests = loader.transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, INFO_URL);
    assert_eq!(requests[0].if_none_match, None);
    assert_eq!(
      loader.store.record("gwasinfo.json"),
      Some(CacheRecord::new(body, Some("\"v1\"".to_string())))
    );
  }

  #[tokio::test]
  async fn cached_validator_is_sent() {
    let store = MemoryStore::with_record(
      "gwasinfo.json",
      CacheRecord::new(json!([1]), Some("\"abc\"".into())),
    );
    let loader = loader(store, [Reply::not_modified()]);

    loader.load("gwasinfo", None).await.unwrap();

    assert_eq!(
      loader.transport.requests()[0].if_none_match.as_deref(),
      Some("\"abc\"")
    );
  }

  #[tokio::test]
  async fn empty_cached_validator_is_not_sent() {
    let store = MemoryStore::with_record(
      "gwasinfo.json",
      CacheRecord::new(json!([1]), Some(String::new())),
    );
    let loader = loader(store, [Reply::json(&json!([2]), Some("\"v2\""))]);

    let data = loader.load("gwasinfo", None).await.unwrap();

    assert_eq!(data, json!([2]));
    assert_eq!(loader.transport.requests()[0].if_none_match, None);
  }

  #[tokio::test]
  async fn cached_record_without_validator_fetches_unconditionally() {
    let store = MemoryStore::with_record("gwasinfo.json", CacheRecord::new(json!([1]), None));
    let loader = loader(store, [Reply::json(&json!([2]), None)]);

    let data = loader.load("gwasinfo", None).await.unwrap();

    assert_eq!(data, json!([2]));
    assert_eq!(loader.transport.requests()[0].if_none_match, None);
  }

  #[tokio::test]
  async fn not_modified_serves_cache_without_writing() {
    let cached = json!({"batches": ["ieu-a", "ukb-b"]});
    let store = MemoryStore::with_record(
      "gwasinfo_batches.json",
      CacheRecord::new(cached.clone(), Some("\"v1\"".into())),
    );
    let loader = loader(store, [Reply::not_modified()]);

    let loaded = loader.load_with_source("batches", None).await.unwrap();

    assert_eq!(loaded.data, cached);
    assert_eq!(loaded.source, LoadSource::Cache);
    assert_eq!(loader.store.puts(), 0);
  }

  #[tokio::test]
  async fn modified_replaces_record() {
    let store = MemoryStore::with_record(
      "gwasinfo.json",
      CacheRecord::new(json!({"old": true}), Some("\"v1\"".into())),
    );
    let loader = loader(store, [Reply::json(&json!({"new": true}), Some("\"v2\""))]);

    let loaded = loader.load_with_source("gwasinfo", None).await.unwrap();

    assert_eq!(loaded, Loaded::from_network(json!({"new": true})));
    assert_eq!(
      loader.store.record("gwasinfo.json"),
      Some(CacheRecord::new(json!({"new": true}), Some("\"v2\"".into())))
    );
  }

  #[tokio::test]
  async fn not_modified_without_cache_is_inconsistent() {
    let loader = loader(MemoryStore::default(), [Reply::not_modified()]);

    let err = loader.load("gwasinfo", None).await.unwrap_err();

    assert!(matches!(err, LoadError::CacheInconsistent(name) if name == "gwasinfo"));
    assert_eq!(loader.store.puts(), 0);
  }

  #[tokio::test]
  async fn invalid_json_leaves_store_unchanged() {
    let original = CacheRecord::new(json!({"valid": 1}), Some("\"v1\"".into()));
    let store = MemoryStore::with_record("gwasinfo.json", original.clone());
    let loader = loader(store, [Reply::ok(&[b"{\"valid\": "], Some("\"v2\""))]);

    let err = loader.load("gwasinfo", None).await.unwrap_err();

    assert!(matches!(err, LoadError::InvalidJson(_)));
    assert_eq!(loader.store.puts(), 0);
    assert_eq!(loader.store.record("gwasinfo.json"), Some(original));
  }

  #[tokio::test]
  async fn failed_status_leaves_store_unchanged() {
    let loader = loader(
      MemoryStore::default(),
      [Reply::status(StatusCode::SERVICE_UNAVAILABLE)],
    );

    let err = loader.load("gwasinfo", None).await.unwrap_err();

    assert!(matches!(
      err,
      LoadError::FetchFailed { status } if status == StatusCode::SERVICE_UNAVAILABLE
    ));
    assert_eq!(loader.store.puts(), 0);
    assert!(loader.store.record("gwasinfo.json").is_none());
  }

  #[tokio::test]
  async fn unknown_resource_does_no_io() {
    let loader = loader(MemoryStore::default(), [Reply::json(&json!([]), None)]);

    let err = loader.load("variants", None).await.unwrap_err();

    assert!(matches!(err, LoadError::UnknownResource(name) if name == "variants"));
    assert!(loader.transport.requests().is_empty());
    assert_eq!(loader.store.gets(), 0);
    assert_eq!(loader.store.puts(), 0);
  }

  #[tokio::test]
  async fn progress_is_forwarded() {
    let loader = loader(
      MemoryStore::default(),
      [Reply::ok(&[b"[1,2", b",3,4]"], None)],
    );
    let mut seen = Vec::new();
    let mut record = |p: u64| seen.push(p);

    loader.load("batches", Some(&mut record)).await.unwrap();

    assert_eq!(seen, vec![44, 100]);
  }

  #[tokio::test]
  async fn resources_use_their_own_keys() {
    let loader = loader(
      MemoryStore::default(),
      [
        Reply::json(&json!("info"), Some("\"i\"")),
        Reply::json(&json!("batches"), Some("\"b\"")),
      ],
    );

    loader.load("gwasinfo", None).await.unwrap();
    loader.load("batches", None).await.unwrap();

    assert_eq!(loader.store.record("gwasinfo.json").unwrap().data, json!("info"));
    assert_eq!(
      loader.store.record("gwasinfo_batches.json").unwrap().data,
      json!("batches")
    );
    let urls: Vec<_> = loader
      .transport
      .requests()
      .into_iter()
      .map(|r| r.url)
      .collect();
    assert_eq!(urls, vec![INFO_URL, BATCH_URL]);
  }

  #[tokio::test]
  async fn load_default_uses_single_resource() {
    let loader = Loader::new(
      Catalog::single("only", ResourceDescriptor::new("only.json", INFO_URL)),
      MemoryStore::default(),
      ScriptedTransport::new([Reply::json(&json!({"x": 1}), None)]),
    );

    assert_eq!(loader.default_name().unwrap(), "only");
    let loaded = loader.load_default(None).await.unwrap();
    assert_eq!(loaded.data, json!({"x": 1}));
    assert_eq!(loader.store.record("only.json").unwrap().data, json!({"x": 1}));
  }

  #[tokio::test]
  async fn load_default_without_default_is_unknown() {
    let loader = loader(MemoryStore::default(), Vec::new());
    assert!(loader.default_name().is_err());
    let err = loader.load_default(None).await.unwrap_err();
    assert!(matches!(err, LoadError::UnknownResource(_)));
    assert!(loader.transport.requests().is_empty());
  }

  #[tokio::test]
  async fn second_load_revalidates_against_sqlite_store() {
    let body = json!({"ieu-b-40": {"trait": "Height"}});
    let loader = Loader::new(
      catalog(),
      SqliteStore::open_in_memory().unwrap(),
      ScriptedTransport::new([Reply::json(&body, Some("\"v7\"")), Reply::not_modified()]),
    );

    let first = loader.load_with_source("gwasinfo", None).await.unwrap();
    let second = loader.load_with_source("gwasinfo", None).await.unwrap();

    assert_eq!(first.source, LoadSource::Network);
    assert_eq!(second.source, LoadSource::Cache);
    assert_eq!(second.data, body);

    let requests = loader.transport.requests();
    assert_eq!(requests[1].if_none_match.as_deref(), Some("\"v7\""));

    let stored = loader.cached("gwasinfo").await.unwrap().unwrap();
    assert_eq!(stored.record.validator.as_deref(), Some("\"v7\""));
  }

  #[tokio::test]
  async fn concurrent_loads_are_independent() {
    let loader = loader(
      MemoryStore::default(),
      [
        Reply::json(&json!(1), Some("\"a\"")),
        Reply::json(&json!(2), Some("\"b\"")),
      ],
    );

    let (a, b) = tokio::join!(loader.load("gwasinfo", None), loader.load("gwasinfo", None));

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(loader.transport.requests().len(), 2);
    assert_eq!(loader.store.puts(), 2);
    // Whichever write landed last is what remains
    let stored = loader.store.record("gwasinfo.json").unwrap();
    assert_eq!(stored.data, json!(2));
    assert_eq!(stored.validator.as_deref(), Some("\"b\""));
  }
}
