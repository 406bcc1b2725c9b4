//! Durable document cache with ETag revalidation.
//!
//! This module provides:
//! - A point get/put record store (SQLite-backed)
//! - A loader that revalidates cached documents with `If-None-Match`
//! - Replacement of a cached document only after a complete, valid download

mod loader;
mod record;
mod storage;

pub use loader::Loader;
pub use record::{CacheRecord, LoadSource, Loaded, StoredRecord};
pub use storage::{RecordStore, SqliteStore, STORE_FILE};
