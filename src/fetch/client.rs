use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam between the feed fetcher and the HTTP transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
