//! Record store trait and SQLite implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::record::{CacheRecord, StoredRecord};
use crate::error::{LoadError, LoadResult};

/// Name of the durable store file inside the data directory.
pub const STORE_FILE: &str = "GwasDB.sqlite";

/// Trait for durable record stores.
///
/// Access is strictly point get/put by key: no deletion, no enumeration.
#[async_trait]
pub trait RecordStore: Send + Sync {
  /// Look up the record stored under `key`. Absence is not an error.
  async fn get(&self, key: &str) -> LoadResult<Option<StoredRecord>>;

  /// Replace whatever is stored under `key` with `record`.
  ///
  /// The write is durable once the returned future resolves.
  async fn put(&self, key: &str, record: &CacheRecord) -> LoadResult<()>;
}

/// SQLite-based record store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  path: PathBuf,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open_default() -> LoadResult<Self> {
    let path = Self::default_path().ok_or_else(|| LoadError::StoreUnavailable {
      path: PathBuf::from(STORE_FILE),
      reason: "could not determine data directory".to_string(),
    })?;
    Self::open(path)
  }

  /// Open (creating on first use) the store at `path`.
  ///
  /// Opening an existing store keeps its contents.
  pub fn open(path: impl AsRef<Path>) -> LoadResult<Self> {
    let path = path.as_ref().to_path_buf();
    let unavailable = |reason: String| LoadError::StoreUnavailable {
      path: path.clone(),
      reason,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)
        .map_err(|e| unavailable(format!("failed to create store directory: {}", e)))?;
    }

    let conn = Connection::open(&path).map_err(|e| unavailable(e.to_string()))?;
    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| unavailable(format!("failed to initialize schema: {}", e)))?;

    debug!(path = %path.display(), "Opened record store");

    Ok(Self {
      conn: Mutex::new(conn),
      path,
    })
  }

  /// Open a store that lives only as long as this value.
  pub fn open_in_memory() -> LoadResult<Self> {
    let path = PathBuf::from(":memory:");
    let conn = Connection::open_in_memory().map_err(|e| LoadError::StoreUnavailable {
      path: path.clone(),
      reason: e.to_string(),
    })?;
    conn.execute_batch(STORE_SCHEMA)?;

    Ok(Self {
      conn: Mutex::new(conn),
      path,
    })
  }

  /// Get the default store path.
  pub fn default_path() -> Option<PathBuf> {
    let data_dir = dirs::data_dir().or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))?;
    Some(data_dir.join("gwasload").join(STORE_FILE))
  }

  /// Where this store lives on disk.
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn lock(&self) -> LoadResult<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| LoadError::Store(format!("Lock poisoned: {}", e)))
  }
}

/// Schema for the record table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS gwas_store (
    key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    validator TEXT,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

#[async_trait]
impl RecordStore for SqliteStore {
  async fn get(&self, key: &str) -> LoadResult<Option<StoredRecord>> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, Option<String>, String)> = conn
      .query_row(
        "SELECT data, validator, cached_at FROM gwas_store WHERE key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()?;

    match row {
      Some((data, validator, cached_at_str)) => {
        let data = serde_json::from_slice(&data)
          .map_err(|e| LoadError::Store(format!("Failed to deserialize record {}: {}", key, e)))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(StoredRecord {
          record: CacheRecord { data, validator },
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  async fn put(&self, key: &str, record: &CacheRecord) -> LoadResult<()> {
    let data = serde_json::to_vec(&record.data)
      .map_err(|e| LoadError::Store(format!("Failed to serialize record {}: {}", key, e)))?;

    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO gwas_store (key, data, validator, cached_at)
       VALUES (?, ?, ?, datetime('now'))",
      params![key, data, record.validator],
    )?;

    debug!(key, bytes = data.len(), "Stored record");
    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> LoadResult<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| LoadError::Store(format!("Failed to parse datetime '{}': {}", s, e)))
}

/// In-memory store that counts operations.
#[cfg(test)]
pub(crate) mod memory {
  use super::*;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[derive(Default)]
  pub struct MemoryStore {
    records: Mutex<HashMap<String, CacheRecord>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
  }

  impl MemoryStore {
    pub fn with_record(key: &str, record: CacheRecord) -> Self {
      let store = Self::default();
      store.records.lock().unwrap().insert(key.to_string(), record);
      store
    }

    pub fn record(&self, key: &str) -> Option<CacheRecord> {
      self.records.lock().unwrap().get(key).cloned()
    }

    pub fn gets(&self) -> usize {
      self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
      self.puts.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl RecordStore for MemoryStore {
    async fn get(&self, key: &str) -> LoadResult<Option<StoredRecord>> {
      self.gets.fetch_add(1, Ordering::SeqCst);
      Ok(self.record(key).map(|record| StoredRecord {
        record,
        cached_at: Utc::now(),
      }))
    }

    async fn put(&self, key: &str, record: &CacheRecord) -> LoadResult<()> {
      self.puts.fetch_add(1, Ordering::SeqCst);
      self
        .records
        .lock()
        .unwrap()
        .insert(key.to_string(), record.clone());
      Ok(())
    }
  }
}
