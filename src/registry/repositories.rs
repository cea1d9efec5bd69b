// src/registry/repositories.rs

//! Repository listing used as a pre-flight check before a sync

use super::RegistryServer;
use crate::error::{Error, Result};
use crate::format::ComponentFormat;
use crate::http::RetryClient;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

/// A repository as listed by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub format: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
}

/// Ensure `repository` exists on `server` and holds components of `format`.
pub async fn check_repository(
    client: &RetryClient,
    server: &RegistryServer,
    repository: &str,
    format: ComponentFormat,
) -> Result<()> {
    let request = client
        .inner()
        .get(server.repositories_url())
        .header(ACCEPT, "application/json")
        .basic_auth(&server.username, Some(&server.password));
    let response = client.send(request).await.map_err(|e| {
        Error::RegistryError(format!("unable to list repositories at {}: {}", server.host, e))
    })?;

    if response.status() != StatusCode::OK {
        return Err(Error::RegistryError(format!(
            "unable to list repositories at {}: {}",
            server.host,
            response.status()
        )));
    }

    let repositories: Vec<Repository> = response.json().await.map_err(|e| {
        Error::RegistryError(format!(
            "malformed repository list at {}: {}",
            server.host, e
        ))
    })?;

    match find_repository(&repositories, repository) {
        None => Err(Error::NotFoundError(format!(
            "repository '{}' does not exist at {}",
            repository, server.host
        ))),
        Some(found) if !found.format.eq_ignore_ascii_case(format.as_str()) => {
            Err(Error::NotFoundError(format!(
                "repository '{}' at {} has format '{}', expected '{}'",
                repository, server.host, found.format, format
            )))
        }
        Some(_) => Ok(()),
    }
}

fn find_repository<'a>(repositories: &'a [Repository], name: &str) -> Option<&'a Repository> {
    repositories
        .iter()
        .find(|repo| repo.name.eq_ignore_ascii_case(name))
}
