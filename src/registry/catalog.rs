// src/registry/catalog.rs

//! Paginated catalog reads
//!
//! The components endpoint answers one page at a time together with an
//! opaque continuation token. [`CatalogReader::fetch_all`] follows the tokens
//! until the last page and returns the normalized flat list.

use super::RegistryServer;
use crate::error::{Error, Result};
use crate::format::{self, ComponentFormat};
use crate::http::{METADATA_TIMEOUT, RetryClient};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Emit a progress line every this many components
const PROGRESS_EVERY: usize = 500;

/// A versioned package in a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub group: Option<String>,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Component {
    /// Parsed format, `None` for formats this tool does not replicate
    pub fn component_format(&self) -> Option<ComponentFormat> {
        ComponentFormat::from_str(&self.format).ok()
    }
}

/// One downloadable file belonging to a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default)]
    pub download_url: String,
    pub path: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub content_type: String,
}

/// One page of the components endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentPage {
    #[serde(default)]
    pub items: Vec<Component>,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

/// Apply per-format normalization to components in place.
///
/// Maven2 assets lose their checksum sidecars. NuGet versions and asset
/// file names lose their `+build` metadata suffix.
pub fn normalize_components(components: &mut [Component]) {
    for component in components.iter_mut() {
        match component.component_format() {
            Some(ComponentFormat::Maven2) => {
                component
                    .assets
                    .retain(|asset| !format::is_checksum_sidecar(format::file_name_from_path(&asset.path)));
            }
            Some(ComponentFormat::Nuget) => {
                component.version = format::strip_build_metadata(&component.version).to_string();
                for asset in component.assets.iter_mut() {
                    asset.path = strip_path_build_metadata(&asset.path);
                }
            }
            _ => {}
        }
    }
}

fn strip_path_build_metadata(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, base)) => format!("{}/{}", dir, format::strip_build_metadata(base)),
        None => format::strip_build_metadata(path).to_string(),
    }
}

/// Reads the full component catalog of a repository
pub struct CatalogReader {
    server: RegistryServer,
    client: RetryClient,
}

impl CatalogReader {
    /// Create a reader for the given registry
    pub fn new(server: RegistryServer) -> Result<Self> {
        Ok(Self {
            server,
            client: RetryClient::new(METADATA_TIMEOUT)?,
        })
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(server: RegistryServer, client: RetryClient) -> Self {
        Self { server, client }
    }

    pub fn server(&self) -> &RegistryServer {
        &self.server
    }

    /// Follow continuation tokens until the catalog is exhausted.
    ///
    /// The cancellation token is checked before each page; a cancelled read
    /// returns [`Error::Cancelled`] without issuing further requests.
    pub async fn fetch_all(
        &self,
        repository: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Component>> {
        let mut components = Vec::new();
        let mut continuation: Option<String> = None;
        let mut next_progress = PROGRESS_EVERY;

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(repository));
            }

            let page = tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled(repository)),
                page = self.fetch_page(repository, continuation.as_deref()) => page?,
            };

            let mut items = page.items;
            normalize_components(&mut items);
            components.extend(items);

            if components.len() >= next_progress {
                debug!(
                    "Read {} components of repository '{}' from {}",
                    components.len(),
                    repository,
                    self.server.host
                );
                next_progress = components.len() + PROGRESS_EVERY;
            }

            match page.continuation_token {
                Some(token) if !token.is_empty() => continuation = Some(token),
                _ => break,
            }
        }

        info!(
            "Read {} components of repository '{}' from {}",
            components.len(),
            repository,
            self.server.host
        );
        Ok(components)
    }

    /// Fetch a single page
    pub async fn fetch_page(
        &self,
        repository: &str,
        continuation: Option<&str>,
    ) -> Result<ComponentPage> {
        let mut request = self
            .client
            .inner()
            .get(self.server.components_url())
            .query(&[("repository", repository)])
            .header(ACCEPT, "application/json")
            .basic_auth(&self.server.username, Some(&self.server.password));
        if let Some(token) = continuation {
            request = request.query(&[("continuationToken", token)]);
        }

        let response = self.client.send(request).await.map_err(|e| {
            Error::RegistryError(format!(
                "unable to read components of repository '{}' at {}: {}",
                repository, self.server.host, e
            ))
        })?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RegistryError(format!(
                "unable to read components of repository '{}' at {}: {} {}",
                repository,
                self.server.host,
                status,
                body.trim()
            )));
        }

        response.json::<ComponentPage>().await.map_err(|e| {
            Error::RegistryError(format!(
                "malformed catalog page of repository '{}' at {}: {}",
                repository, self.server.host, e
            ))
        })
    }

    fn cancelled(&self, repository: &str) -> Error {
        Error::Cancelled(format!(
            "catalog read of repository '{}' at {}",
            repository, self.server.host
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(path: &str) -> Asset {
        Asset {
            download_url: String::new(),
            path: path.to_string(),
            id: String::new(),
            repository: "r".to_string(),
            format: String::new(),
            content_type: String::new(),
        }
    }

    fn component(format: &str, version: &str, paths: &[&str]) -> Component {
        Component {
            id: String::new(),
            repository: "r".to_string(),
            format: format.to_string(),
            group: None,
            name: "pkg".to_string(),
            version: version.to_string(),
            assets: paths.iter().map(|p| asset(p)).collect(),
        }
    }

    #[test]
    fn test_maven_sidecars_removed() {
        let mut items = vec![component(
            "maven2",
            "1.0",
            &[
                "g/pkg/1.0/pkg-1.0.jar",
                "g/pkg/1.0/pkg-1.0.jar.sha1",
                "g/pkg/1.0/pkg-1.0.jar.md5",
                "g/pkg/1.0/pkg-1.0.pom",
                "g/pkg/1.0/pkg-1.0.pom.sha512",
            ],
        )];
        normalize_components(&mut items);
        let paths: Vec<_> = items[0].assets.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["g/pkg/1.0/pkg-1.0.jar", "g/pkg/1.0/pkg-1.0.pom"]);
    }

    #[test]
    fn test_nuget_build_metadata_stripped() {
        let mut items = vec![component(
            "nuget",
            "5.2.1-develop.1832+sha.19b3cdc",
            &["GitVersion.Tool/5.2.1-develop.1832+sha.19b3cdc"],
        )];
        normalize_components(&mut items);
        assert_eq!(items[0].version, "5.2.1-develop.1832");
        assert_eq!(items[0].assets[0].path, "GitVersion.Tool/5.2.1-develop.1832");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut items = vec![
            component("nuget", "5.2.1-develop.1832+sha.19b3cdc", &["Pkg/5.2.1-develop.1832+sha.19b3cdc"]),
            component("maven2", "1.0", &["g/pkg/1.0/pkg-1.0.jar", "g/pkg/1.0/pkg-1.0.jar.md5"]),
        ];
        normalize_components(&mut items);
        let once = items.clone();
        normalize_components(&mut items);
        assert_eq!(items, once);
    }

    #[test]
    fn test_other_formats_untouched() {
        let mut items = vec![component("npm", "1.0.0+x", &["pkg/-/pkg-1.0.0.tgz.sha1"])];
        let before = items.clone();
        normalize_components(&mut items);
        assert_eq!(items, before);
    }

    #[test]
    fn test_page_with_null_token() {
        let page: ComponentPage = serde_json::from_str(
            r#"{"items":[{"name":"a","version":"1","format":"npm","group":null,"assets":[]}],"continuationToken":null}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_page() {
        let reader =
            CatalogReader::new(RegistryServer::new("http://127.0.0.1:1", "u", "p")).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = reader.fetch_all("repo", &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
    }
}
