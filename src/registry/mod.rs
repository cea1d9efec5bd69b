// src/registry/mod.rs

//! Nexus-compatible registry access
//!
//! A [`RegistryServer`] describes one registry endpoint with its credentials.
//! It is sent on the wire inside an export payload so the broker knows where
//! to upload, and is used locally to read catalogs and list repositories.

mod catalog;
mod repositories;

pub use catalog::{Asset, CatalogReader, Component, ComponentPage, normalize_components};
pub use repositories::{Repository, check_repository};

use serde::{Deserialize, Serialize};
use std::fmt;

/// REST prefix shared by registries and the broker
pub const URI_BASE: &str = "/service/rest";

/// Components endpoint below [`URI_BASE`]
pub const URI_COMPONENTS: &str = "/v1/components";

/// Repository listing endpoint below [`URI_BASE`]
pub const URI_REPOSITORIES: &str = "/v1/repositories";

/// One registry endpoint and the credentials used against it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryServer {
    /// Scheme, host and port, e.g. `https://nexus.example.com`
    pub host: String,
    pub base_url: String,
    pub api_components_url: String,
    pub username: String,
    pub password: String,
}

impl RegistryServer {
    /// Describe a registry reachable at `host` with the standard REST layout
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            base_url: URI_BASE.to_string(),
            api_components_url: URI_COMPONENTS.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Full URL of the components endpoint
    pub fn components_url(&self) -> String {
        format!("{}{}{}", self.host, self.base_url, self.api_components_url)
    }

    /// Full URL of the repository listing endpoint
    pub fn repositories_url(&self) -> String {
        format!("{}{}{}", self.host, self.base_url, URI_REPOSITORIES)
    }
}

impl fmt::Debug for RegistryServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryServer")
            .field("host", &self.host)
            .field("base_url", &self.base_url)
            .field("api_components_url", &self.api_components_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
