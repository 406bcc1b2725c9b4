//! gwasload - fetch remote JSON documents through a durable, ETag-revalidated
//! local cache.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;

pub use cache::{CacheRecord, Loaded, LoadSource, Loader, RecordStore, SqliteStore};
pub use catalog::{Catalog, ResourceDescriptor};
pub use error::{LoadError, LoadResult};
pub use fetch::{fetch_with_progress, FetchOutcome, HttpTransport, Progress, Transport};
