use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::{BasicClient, HttpClient, fetch_bytes};
use crate::config::MonitorConfig;
use crate::error::MonitorError;

/// Where raw feed bytes come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, MonitorError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> &str;
}

/// Feed served over HTTP(S).
pub struct HttpFeed<C = BasicClient> {
    client: C,
    url: String,
}

impl<C: HttpClient> HttpFeed<C> {
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> FeedSource for HttpFeed<C> {
    async fn fetch(&self) -> Result<Vec<u8>, MonitorError> {
        let bytes = fetch_bytes(&self.client, &self.url).await?;
        debug!(url = %self.url, bytes = bytes.len(), "Feed bytes received");
        Ok(bytes)
    }

    fn describe(&self) -> &str {
        &self.url
    }
}

/// Feed snapshot read from disk on every fetch.
pub struct FileFeed {
    path: PathBuf,
    display: String,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display = path.display().to_string();
        Self { path, display }
    }
}

#[async_trait]
impl FeedSource for FileFeed {
    async fn fetch(&self) -> Result<Vec<u8>, MonitorError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| MonitorError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn describe(&self) -> &str {
        &self.display
    }
}

/// Picks an HTTP or file source from the configured feed location.
pub fn feed_source(config: &MonitorConfig) -> Result<Box<dyn FeedSource>, MonitorError> {
    if config.feed_url.starts_with("http") {
        let client = BasicClient::new(config.request_timeout, config.insecure_tls)?;
        Ok(Box::new(HttpFeed::new(client, &config.feed_url)))
    } else {
        Ok(Box::new(FileFeed::new(&config.feed_url)))
    }
}
