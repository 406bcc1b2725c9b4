//! reqwest-backed transport.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, ETAG, IF_NONE_MATCH};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

use super::{Transport, TransportResponse};
use crate::config::HttpConfig;
use crate::error::{LoadError, LoadResult};

/// HTTP transport wrapping a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpTransport {
  client: Client,
}

impl HttpTransport {
  pub fn new(config: &HttpConfig) -> LoadResult<Self> {
    // Transparent decompression drops Content-Length, which progress needs
    let mut builder = Client::builder()
      .user_agent(config.user_agent.clone())
      .no_gzip()
      .no_deflate();
    if let Some(secs) = config.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }

    let client = builder
      .build()
      .map_err(|e| LoadError::Transport(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self { client })
  }
}

/// Read the `ETag` header verbatim, keeping non-ASCII values that are UTF-8.
fn read_etag(headers: &HeaderMap) -> Option<String> {
  let value = headers.get(ETAG)?;
  match String::from_utf8(value.as_bytes().to_vec()) {
    Ok(etag) => Some(etag),
    Err(_) => {
      debug!(etag = ?value, "Dropping ETag that is not valid UTF-8");
      None
    }
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn get(&self, url: &str, if_none_match: Option<&str>) -> LoadResult<TransportResponse> {
    let url: Url = url
      .parse()
      .map_err(|e| LoadError::Transport(format!("Invalid URL {}: {}", url, e)))?;

    let mut req = self.client.get(url.clone());
    if let Some(etag) = if_none_match {
      req = req.header(IF_NONE_MATCH, etag);
    }

    let response = req.send().await?;
    debug!(url = %url, status = %response.status(), "Received response");

    let etag = read_etag(response.headers());

    Ok(TransportResponse {
      status: response.status(),
      content_length: response.content_length(),
      etag,
      body: response
        .bytes_stream()
        .map(|chunk| chunk.map_err(LoadError::from))
        .boxed(),
    })
  }
}
