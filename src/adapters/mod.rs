// src/adapters/mod.rs

//! Format adapters
//!
//! Each supported format knows how to locate an asset at its public origin,
//! download it as a stream, and wrap the stream in the multipart body the
//! destination registry expects. Individually uploaded formats produce one
//! adapter per asset; bundled formats produce one adapter per component.

mod maven2;
pub mod multipart;
mod npm;
mod nuget;
mod pypi;

pub use maven2::{Maven2Component, asset_classifier, has_pom};
pub use multipart::{ByteStream, MultipartBody};
pub use npm::NpmAsset;
pub use nuget::{NugetAsset, NugetEndpoint};
pub use pypi::PypiAsset;

use crate::error::{Error, Result};
use crate::export::ExportComponent;
use crate::format::ComponentFormat;
use crate::http::{DOWNLOAD_TIMEOUT, METADATA_TIMEOUT, RetryClient};
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A downloaded file, still streaming from its origin
pub struct Download {
    pub file_name: String,
    pub content: ByteStream,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

/// Encoded request body ready for the destination
pub struct PreparedUpload {
    pub content_type: String,
    pub body: ByteStream,
}

impl fmt::Debug for PreparedUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedUpload")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// HTTP access to public artifact origins
#[derive(Clone)]
pub struct OriginClient {
    metadata: RetryClient,
    download: RetryClient,
    nuget_endpoints: Arc<Mutex<HashMap<String, NugetEndpoint>>>,
}

impl OriginClient {
    pub fn new() -> Result<Self> {
        Ok(Self::with_clients(
            RetryClient::new(METADATA_TIMEOUT)?,
            RetryClient::new(DOWNLOAD_TIMEOUT)?,
        ))
    }

    pub fn with_clients(metadata: RetryClient, download: RetryClient) -> Self {
        Self {
            metadata,
            download,
            nuget_endpoints: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fetch and decode a JSON metadata document
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let request = self
            .metadata
            .inner()
            .get(url)
            .header(ACCEPT, "application/json");
        let response = self
            .metadata
            .send(request)
            .await
            .map_err(|e| Error::DownloadError(format!("GET {url}: {e}")))?;

        if response.status() != StatusCode::OK {
            return Err(Error::DownloadError(format!(
                "GET {url}: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::ParseError(format!("malformed document at {url}: {e}")))
    }

    /// Start downloading `url`, returning the body as a stream
    pub async fn download(&self, url: &str, file_name: &str) -> Result<Download> {
        debug!("Downloading {} from {}", file_name, url);
        let request = self
            .download
            .inner()
            .get(url)
            .header(ACCEPT, "application/octet-stream");
        let response = self
            .download
            .send(request)
            .await
            .map_err(|e| Error::DownloadError(format!("unable to download asset. GET {url}: {e}")))?;

        if response.status() != StatusCode::OK {
            return Err(Error::DownloadError(format!(
                "unable to download asset. GET {url}: {}",
                response.status()
            )));
        }

        Ok(Download {
            file_name: file_name.to_string(),
            content: response.bytes_stream().boxed(),
        })
    }

    pub(crate) fn cached_nuget_endpoint(&self, source: &str) -> Option<NugetEndpoint> {
        self.nuget_endpoints.lock().get(source).cloned()
    }

    pub(crate) fn cache_nuget_endpoint(&self, source: &str, endpoint: NugetEndpoint) {
        self.nuget_endpoints
            .lock()
            .insert(source.to_string(), endpoint);
    }
}

/// One upload unit and the format-specific logic to move it
pub enum Adapter {
    Npm(NpmAsset),
    Pypi(PypiAsset),
    Nuget(NugetAsset),
    Maven2(Maven2Component),
}

impl Adapter {
    /// Split a component into its upload units.
    ///
    /// Bundled formats yield a single adapter covering every asset; the
    /// others yield one adapter per asset.
    pub fn plan(component: &ExportComponent) -> Vec<Adapter> {
        let source = component.artifacts_source.as_str();
        match component.format {
            ComponentFormat::Maven2 => {
                vec![Adapter::Maven2(Maven2Component::new(component.clone()))]
            }
            ComponentFormat::Npm => component
                .assets
                .iter()
                .map(|asset| Adapter::Npm(NpmAsset::new(source, asset.clone())))
                .collect(),
            ComponentFormat::Pypi => component
                .assets
                .iter()
                .map(|asset| Adapter::Pypi(PypiAsset::new(source, asset.clone())))
                .collect(),
            ComponentFormat::Nuget => component
                .assets
                .iter()
                .map(|asset| Adapter::Nuget(NugetAsset::new(source, asset.clone())))
                .collect(),
        }
    }

    pub fn format(&self) -> ComponentFormat {
        match self {
            Adapter::Npm(_) => ComponentFormat::Npm,
            Adapter::Pypi(_) => ComponentFormat::Pypi,
            Adapter::Nuget(_) => ComponentFormat::Nuget,
            Adapter::Maven2(_) => ComponentFormat::Maven2,
        }
    }

    /// Asset path for single-asset units, every asset path for bundles
    pub fn label(&self) -> String {
        match self {
            Adapter::Npm(a) => a.asset().path.clone(),
            Adapter::Pypi(a) => a.asset().path.clone(),
            Adapter::Nuget(a) => a.asset().path.clone(),
            Adapter::Maven2(c) => c.label(),
        }
    }

    /// Open download streams for every file of the unit
    pub async fn download(&self, origin: &OriginClient) -> Result<Vec<Download>> {
        match self {
            Adapter::Npm(a) => Ok(vec![a.download(origin).await?]),
            Adapter::Pypi(a) => Ok(vec![a.download(origin).await?]),
            Adapter::Nuget(a) => Ok(vec![a.download(origin).await?]),
            Adapter::Maven2(c) => c.download(origin).await,
        }
    }

    /// Encode downloads into the destination's multipart layout
    pub fn prepare_upload(&self, downloads: Vec<Download>) -> Result<PreparedUpload> {
        match self {
            Adapter::Maven2(c) => c.prepare_upload(downloads),
            single => {
                let download = downloads.into_iter().next().ok_or_else(|| {
                    Error::EmptyComponentError(format!("nothing downloaded for {}", single.label()))
                })?;
                Ok(single_asset_upload(single.format(), download))
            }
        }
    }
}

/// Body with exactly one file part named `<format>.asset`
fn single_asset_upload(format: ComponentFormat, download: Download) -> PreparedUpload {
    let mut body = MultipartBody::new();
    body.add_file(&format.asset_field(), &download.file_name, download.content);
    PreparedUpload {
        content_type: body.content_type(),
        body: body.finish(),
    }
}
