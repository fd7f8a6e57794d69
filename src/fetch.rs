//! Network fetcher abstraction for remote images.
//!
//! The trait exists for dependency injection: the orchestrator is generic
//! over it so tests can substitute a mock without touching the network.

use std::future::Future;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent sent with every image request.
const USER_AGENT: &str = concat!("photostash/", env!("CARGO_PKG_VERSION"));

/// Errors from a network fetch.
///
/// The orchestrator collapses every variant into an absent result; the
/// detail exists for logging only.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// Transport failure, non-success status, or unreadable body
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Downloads the bytes behind a locator.
///
/// On any failure the caller receives an error and treats it as "no image";
/// no retry or backoff is applied at this layer.
pub trait ImageFetcher: Send + Sync {
    /// Fetch the raw bytes for a URL.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// HTTP fetcher backed by a pooled reqwest client.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Create a fetcher with a custom timeout in seconds.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(16)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        trace!(url = url, "image fetch starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "image response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "image request failed"
                );
                return Err(FetchError::Http(format!("request failed: {}", e)));
            }
        };

        if !response.status().is_success() {
            warn!(
                url = url,
                status = response.status().as_u16(),
                "image request returned error status"
            );
            return Err(FetchError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "image body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url = url, error = %e, "failed to read image body");
                Err(FetchError::Http(format!("failed to read response: {}", e)))
            }
        }
    }
}
