//! HTTP client for fetching remote XMLTV sources.

use crate::{Error, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::info;

/// Default per-request timeout. Guide servers are routinely slow; a minute
/// matches the upstream feeds this tool is pointed at.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for fetching XMLTV guide sources.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a new fetcher with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    /// Creates a new fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("epgmerge/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }

    /// Fetches a URL and returns the response body.
    ///
    /// Non-success status codes and timeouts are errors; the caller treats
    /// a failed source as "contributes nothing" and continues. The body is
    /// returned as bytes because `.gz` sources arrive compressed at the
    /// payload level, not the transport level.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        let response = self.client.get(url).send().await?;
        let response = response.error_for_status().map_err(Error::Network)?;
        let body = response.bytes().await?;

        info!(
            "Fetched {} bytes from {} in {:.2}s",
            body.len(),
            url,
            started.elapsed().as_secs_f64()
        );
        Ok(body.to_vec())
    }
}

// Note: Default is not implemented as Fetcher::new() can fail.
// Use Fetcher::new() directly and handle the Result.
