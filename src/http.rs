// src/http.rs

//! HTTP client for registry, origin and broker operations
//!
//! Wraps reqwest with a bounded retry loop for requests whose body can be
//! replayed. Streaming uploads do not go through here; they carry their own
//! connection-level retry in the upload dispatcher.

use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::warn;

/// Timeout for catalog pages and metadata documents
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for artifact downloads from an origin
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(180);

/// Timeout for a single upload to the destination registry
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(900);

/// Maximum attempts for a retryable request
const MAX_RETRIES: u32 = 3;

/// Base retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 500;

/// Build a plain reqwest client with the given overall timeout
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("nexus-relay/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))
}

/// HTTP client wrapper with retry support
#[derive(Clone)]
pub struct RetryClient {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl RetryClient {
    /// Create a new client with the given timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            max_retries: MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Override the retry budget
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Get a reference to the inner HTTP client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Send a request, retrying connection failures and 5xx answers.
    ///
    /// The final answer is returned as-is whatever its status; callers decide
    /// what counts as success.
    pub async fn send(&self, request: RequestBuilder) -> reqwest::Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(current) = request.try_clone() else {
                return request.send().await;
            };

            match current.send().await {
                Ok(response)
                    if response.status().is_server_error() && attempt < self.max_retries =>
                {
                    warn!(
                        "Request to {} attempt {} returned {}, retrying...",
                        response.url(),
                        attempt,
                        response.status()
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.max_retries => {
                    warn!("Request attempt {} failed: {}, retrying...", attempt, e);
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(self.retry_delay * attempt).await;
        }
    }
}
