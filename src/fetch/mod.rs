//! Conditional fetching of JSON documents with download progress.
//!
//! A fetch sends `If-None-Match` when a validator is known, reads the body as
//! a stream of chunks, and reassembles it in arrival order before decoding.

mod http;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{LoadError, LoadResult};

pub use http::HttpTransport;

/// Upper bound on buffer pre-allocation taken from `Content-Length`.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Progress callback, receives `floor(received * 100 / total)`.
pub type Progress<'a> = &'a mut (dyn FnMut(u64) + Send);

/// Response head plus a body stream, as seen by the fetcher.
pub struct TransportResponse {
  pub status: StatusCode,
  /// Declared body size, if the server sent one
  pub content_length: Option<u64>,
  /// Raw `ETag` header value
  pub etag: Option<String>,
  pub body: BoxStream<'static, LoadResult<Bytes>>,
}

/// Trait for the network side of a fetch.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Issue a GET for `url`, attaching `If-None-Match` when given.
  async fn get(&self, url: &str, if_none_match: Option<&str>) -> LoadResult<TransportResponse>;
}

/// Outcome of one conditional fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
  /// 304: the cached copy is current
  NotModified,
  /// New body downloaded and parsed
  Fetched {
    data: Value,
    validator: Option<String>,
  },
}

/// Tracks bytes received against a declared total.
#[derive(Debug, Clone, Copy)]
struct ProgressTracker {
  total: Option<u64>,
  received: u64,
}

impl ProgressTracker {
  fn new(content_length: Option<u64>) -> Self {
    Self {
      // A zero length gives no usable ratio
      total: content_length.filter(|&n| n > 0),
      received: 0,
    }
  }

  /// Record a chunk and return the new percentage, if one is computable.
  ///
  /// Not clamped: an understated `Content-Length` yields values above 100.
  fn advance(&mut self, chunk_len: usize) -> Option<u64> {
    self.received += chunk_len as u64;
    self
      .total
      .map(|total| (self.received as u128 * 100 / total as u128) as u64)
  }
}

/// Fetch `url` as JSON, revalidating against `validator` when given.
#[instrument(skip(transport, on_progress), level = "debug")]
pub async fn fetch_with_progress<T>(
  transport: &T,
  url: &str,
  mut on_progress: Option<Progress<'_>>,
  validator: Option<&str>,
) -> LoadResult<FetchOutcome>
where
  T: Transport + ?Sized,
{
  let response = transport.get(url, validator).await?;

  if response.status == StatusCode::NOT_MODIFIED {
    debug!(url, "Content not modified");
    return Ok(FetchOutcome::NotModified);
  }

  if !response.status.is_success() {
    return Err(LoadError::FetchFailed {
      status: response.status,
    });
  }

  match response.content_length {
    Some(len) => debug!(url, content_length = len, "Download size available"),
    None => debug!(url, "Content length not available"),
  }

  let capacity = response.content_length.unwrap_or(0).min(MAX_PREALLOC) as usize;
  let mut buffer: Vec<u8> = Vec::with_capacity(capacity);
  let mut tracker = ProgressTracker::new(response.content_length);
  let mut body = response.body;

  while let Some(chunk) = body.next().await {
    let chunk = chunk?;
    buffer.extend_from_slice(&chunk);

    if let Some(percent) = tracker.advance(chunk.len()) {
      if let Some(callback) = on_progress.as_mut() {
        callback(percent);
      }
    }
  }

  info!(url, bytes = buffer.len(), "Download complete");

  // A leading byte order mark is not part of the document
  let bytes = buffer.strip_prefix(UTF8_BOM).unwrap_or(&buffer[..]);
  let text = std::str::from_utf8(bytes).map_err(LoadError::InvalidEncoding)?;
  let data: Value = serde_json::from_str(text).map_err(LoadError::InvalidJson)?;

  Ok(FetchOutcome::Fetched {
    data,
    validator: response.etag,
  })
}
