// src/adapters/nuget.rs

//! NuGet packages
//!
//! A source ending in `index.json` is a V3 service index that names the
//! package content base address; anything else is treated as a V2 feed.

use super::{Download, OriginClient};
use crate::error::{Error, Result};
use crate::export::ExportAsset;
use crate::format::{file_name_from_path, strip_build_metadata};
use serde::Deserialize;
use tracing::debug;

/// Service index resource type holding flat-container downloads
const PACKAGE_BASE_ADDRESS: &str = "PackageBaseAddress/3.0.0";

#[derive(Debug, Deserialize)]
struct ServiceIndex {
    #[serde(default)]
    resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
struct ServiceResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
}

/// Protocol version and base URL of a NuGet origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NugetEndpoint {
    V2(String),
    V3(String),
}

impl NugetEndpoint {
    /// Work out the protocol of `source`, reading its service index if it has one
    pub async fn resolve(origin: &OriginClient, source: &str) -> Result<Self> {
        if let Some(endpoint) = origin.cached_nuget_endpoint(source) {
            return Ok(endpoint);
        }

        let endpoint = if is_service_index(source) {
            let index: ServiceIndex = origin.get_json(source).await?;
            let base = index
                .resources
                .into_iter()
                .find(|r| r.kind == PACKAGE_BASE_ADDRESS)
                .map(|r| r.id)
                .ok_or_else(|| {
                    Error::NotFoundError(format!(
                        "no {} resource in service index {}",
                        PACKAGE_BASE_ADDRESS, source
                    ))
                })?;
            debug!("NuGet source {} resolved to V3 base {}", source, base);
            NugetEndpoint::V3(base)
        } else {
            NugetEndpoint::V2(source.to_string())
        };

        origin.cache_nuget_endpoint(source, endpoint.clone());
        Ok(endpoint)
    }

    /// Download URL of a package, lowercased, without build metadata
    pub fn package_url(&self, name: &str, version: &str) -> String {
        let version = strip_build_metadata(version);
        let url = match self {
            NugetEndpoint::V2(base) => format!(
                "{}/package/{}/{}",
                base.trim_end_matches('/'),
                name,
                version
            ),
            NugetEndpoint::V3(base) => format!(
                "{}/{}/{}/{}.{}.nupkg",
                base.trim_end_matches('/'),
                name,
                version,
                name,
                version
            ),
        };
        url.to_lowercase()
    }
}

fn is_service_index(source: &str) -> bool {
    match url::Url::parse(source) {
        Ok(url) => file_name_from_path(url.path()) == "index.json",
        Err(_) => file_name_from_path(source) == "index.json",
    }
}

pub struct NugetAsset {
    source: String,
    asset: ExportAsset,
}

impl NugetAsset {
    pub fn new(source: &str, asset: ExportAsset) -> Self {
        Self {
            source: source.to_string(),
            asset,
        }
    }

    pub fn asset(&self) -> &ExportAsset {
        &self.asset
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}.{}.nupkg",
            self.asset.name,
            strip_build_metadata(&self.asset.version)
        )
        .to_lowercase()
    }

    pub async fn download(&self, origin: &OriginClient) -> Result<Download> {
        let endpoint = NugetEndpoint::resolve(origin, &self.source).await?;
        let url = endpoint.package_url(&self.asset.name, &self.asset.version);
        origin.download(&url, &self.file_name()).await
    }
}
