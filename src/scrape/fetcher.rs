//! Authenticated HTTP fetch of the profile page.

use reqwest::{Client, StatusCode, header};
use tracing::debug;

use super::{FetchTarget, PageSource, ScrapeError};

/// Fetches the target page over HTTP, replaying a static cookie.
///
/// One attempt per call and no per-request timeout; a failed fetch is retried
/// only by the next scheduled tick.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
    url: String,
    cookie: String,
    user_agent: String,
}

impl HttpPageSource {
    /// Builds the HTTP client for `target`. The client is reused across ticks.
    pub fn new(target: &FetchTarget) -> Result<Self, ScrapeError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            url: target.url.clone(),
            cookie: target.cookie.clone(),
            user_agent: target.user_agent.clone(),
        })
    }
}

impl PageSource for HttpPageSource {
    async fn fetch(&self) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(&self.url)
            .header(header::COOKIE, &self.cookie)
            .header(header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScrapeError::HttpStatus {
                code: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(url = %self.url, bytes = body.len(), "page fetched");
        Ok(body)
    }
}
