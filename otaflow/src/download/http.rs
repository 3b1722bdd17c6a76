//! HTTP byte source for component blocks.
//!
//! Fetches component ranges with HTTP Range requests, one request per
//! transfer block. The source must honor ranges; a server that replies with
//! the whole body surfaces as a short/long read and fails the component
//! rather than corrupting the artifact.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::RANGE;

use super::driver::ComponentFetcher;
use super::error::{DownloadError, DownloadResult};
use crate::manifest::Component;

/// Default timeout for a single block request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP-backed [`ComponentFetcher`].
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Create a fetcher with the default per-block timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom per-block timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, timeout }
    }

    /// The configured per-block timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ComponentFetcher for HttpFetcher {
    fn fetch_block(
        &self,
        component: &Component,
        offset: u64,
        len: usize,
    ) -> DownloadResult<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }

        let url = &component.uri;
        let range = format!("bytes={}-{}", offset, offset + len as u64 - 1);

        let response = self
            .client
            .get(url)
            .header(RANGE, range)
            .send()
            .map_err(|e| DownloadError::Fetch {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        // 206 Partial Content is the expected answer; 200 is tolerated for
        // single-block components that cover the whole resource.
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().map_err(|e| DownloadError::Fetch {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        if body.len() != len {
            return Err(DownloadError::ShortRead {
                url: url.clone(),
                expected: len,
                actual: body.len(),
            });
        }

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_fetcher_default_timeout() {
        let fetcher = HttpFetcher::default();
        assert_eq!(fetcher.timeout().as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_http_fetcher_with_timeout() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(5));
        assert_eq!(fetcher.timeout().as_secs(), 5);
    }

    #[test]
    fn test_zero_length_fetch_short_circuits() {
        let fetcher = HttpFetcher::new();
        let component = Component {
            package: "fw".to_string(),
            version: "1.0.0".to_string(),
            uri: "http://127.0.0.1:1/unreachable".to_string(),
            hash: None,
            size: 0,
        };

        // No request is made for a zero-length range.
        assert!(fetcher.fetch_block(&component, 0, 0).unwrap().is_empty());
    }
}
