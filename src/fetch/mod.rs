//! Feed acquisition: the HTTP seam plus the [`FeedSource`] implementations
//! the monitor fetches through.

mod basic;
mod client;
mod source;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use source::{FeedSource, FileFeed, HttpFeed, feed_source};

use crate::error::MonitorError;

/// GETs `url` and returns the response body.
///
/// Non-2xx responses are reported as [`MonitorError::HttpStatus`].
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Vec<u8>, MonitorError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| MonitorError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(MonitorError::HttpStatus {
            status: status.as_u16(),
        });
    }
    Ok(resp.bytes().await?.to_vec())
}
