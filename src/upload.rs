// src/upload.rs

//! Upload dispatcher
//!
//! Splits an export payload into upload units, runs them on tokio tasks
//! bounded by a semaphore, and collects exactly one result per unit. A unit
//! downloads from its origin and streams straight into the destination.

use crate::adapters::{Adapter, ByteStream, OriginClient, PreparedUpload};
use crate::error::{Error, Result};
use crate::export::ExportComponents;
use crate::http::{UPLOAD_TIMEOUT, build_client};
use crate::registry::RegistryServer;
use futures::StreamExt;
use futures::future;
use futures::stream;
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info, warn};

/// Default number of units uploaded at once
pub const DEFAULT_CONCURRENCY: usize = 30;

/// Prefix of every failure line in a job response
pub const UPLOAD_ERROR_PREFIX: &str = "upload error for";

/// Attempts at establishing the upload connection
const SEND_ATTEMPTS: u32 = 4;

/// Pause between connection attempts
const SEND_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Outcome of one upload unit
#[derive(Debug)]
pub struct UnitResult {
    /// Asset path, or every asset path of a bundle
    pub label: String,
    pub error: Option<Error>,
}

/// Failure line reported back to the client
pub fn format_failure(label: &str, error: &Error) -> String {
    format!("{UPLOAD_ERROR_PREFIX} '{label}': {error}")
}

/// Aggregate unit results into the job response
pub fn summarize(results: &[UnitResult], repository: &str) -> Vec<String> {
    let failures: Vec<String> = results
        .iter()
        .filter_map(|r| r.error.as_ref().map(|e| format_failure(&r.label, e)))
        .collect();

    if failures.is_empty() {
        vec![format!(
            "All assets successfully uploaded for repository '{}'",
            repository
        )]
    } else {
        failures
    }
}

/// Moves components from their origins into a destination registry
#[derive(Clone)]
pub struct Uploader {
    client: reqwest::Client,
    origin: OriginClient,
    concurrency: usize,
}

impl Uploader {
    pub fn new(concurrency: usize) -> Result<Self> {
        Ok(Self {
            client: build_client(UPLOAD_TIMEOUT)?,
            origin: OriginClient::new()?,
            concurrency: concurrency.max(1),
        })
    }

    /// Replace the origin client
    pub fn with_origin(mut self, origin: OriginClient) -> Self {
        self.origin = origin;
        self
    }

    /// Upload every unit of `export` into `repository`.
    ///
    /// Returns one result per unit, in completion order. Failures of one unit
    /// never affect the others.
    pub async fn upload_all(&self, export: &ExportComponents, repository: &str) -> Vec<UnitResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let destination = Arc::new(export.nexus_server.clone());
        let repository: Arc<str> = Arc::from(repository);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut expected = 0usize;
        for component in &export.items {
            for adapter in Adapter::plan(component) {
                expected += 1;
                let tx = tx.clone();
                let semaphore = semaphore.clone();
                let uploader = self.clone();
                let destination = destination.clone();
                let repository = repository.clone();

                tokio::spawn(async move {
                    let label = adapter.label();
                    let error = match semaphore.acquire_owned().await {
                        Ok(_permit) => uploader
                            .upload_unit(adapter, &destination, &repository)
                            .await
                            .err(),
                        Err(e) => Some(Error::Cancelled(format!("upload of {label}: {e}"))),
                    };
                    let _ = tx.send(UnitResult { label, error });
                });
            }
        }
        drop(tx);

        let mut results = Vec::with_capacity(expected);
        while results.len() < expected {
            match rx.recv().await {
                Some(result) => results.push(result),
                None => {
                    error!(
                        "Upload tasks ended early: {} of {} results collected",
                        results.len(),
                        expected
                    );
                    break;
                }
            }
        }
        results
    }

    /// Download, encode and upload a single unit
    pub async fn upload_unit(
        &self,
        adapter: Adapter,
        destination: &RegistryServer,
        repository: &str,
    ) -> Result<()> {
        let label = adapter.label();
        let result = async {
            let downloads = adapter.download(&self.origin).await?;
            let prepared = adapter.prepare_upload(downloads)?;
            self.post(destination, repository, &label, prepared).await
        }
        .await;

        match &result {
            Ok(()) => info!(
                "Uploaded {} to repository '{}' at {}",
                label, repository, destination.host
            ),
            Err(e) => warn!("Upload of {} failed: {}", label, e),
        }
        result
    }

    /// POST the encoded body, retrying only while the body is untouched
    async fn post(
        &self,
        destination: &RegistryServer,
        repository: &str,
        label: &str,
        prepared: PreparedUpload,
    ) -> Result<()> {
        let PreparedUpload { content_type, body } = prepared;
        let slot = Arc::new(Mutex::new(Some(body)));
        let url = destination.components_url();

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            let request = self
                .client
                .post(&url)
                .query(&[("repository", repository)])
                .header(CONTENT_TYPE, &content_type)
                .basic_auth(&destination.username, Some(&destination.password))
                .body(reqwest::Body::wrap_stream(deferred(slot.clone())));

            match request.send().await {
                Ok(response) => break response,
                Err(e) if attempt < SEND_ATTEMPTS && slot.lock().is_some() => {
                    warn!(
                        "Upload of {} attempt {} failed: {}, retrying...",
                        label, attempt, e
                    );
                    tokio::time::sleep(SEND_RETRY_DELAY).await;
                }
                Err(e) => {
                    return Err(Error::UploadError(format!(
                        "unable to upload component {} to repository '{}' at server {}. Reason: {}",
                        label, repository, destination.host, e
                    )));
                }
            }
        };

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(Error::UploadError(format!(
            "unable to upload component {} to repository '{}' at server {}. Reason: {}. Response: {}",
            label,
            repository,
            destination.host,
            status,
            text.trim()
        )))
    }
}

/// Body stream that takes its content from `slot` on first poll.
///
/// A request that fails before the body is polled leaves the content in the
/// slot, so the connection can be retried without regenerating the payload.
fn deferred(slot: Arc<Mutex<Option<ByteStream>>>) -> ByteStream {
    stream::once(async move { slot.lock().take() })
        .filter_map(future::ready)
        .flatten()
        .boxed()
}
