// src/adapters/pypi.rs

//! PyPI distributions
//!
//! The origin's per-release JSON document lists every file of a release with
//! its download URL; the asset is matched by file name.

use super::{Download, OriginClient};
use crate::error::{Error, Result};
use crate::export::ExportAsset;
use crate::format::join_url;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ReleaseDocument {
    #[serde(default)]
    urls: Vec<ReleaseFile>,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    filename: String,
    url: String,
}

pub struct PypiAsset {
    source: String,
    asset: ExportAsset,
}

impl PypiAsset {
    pub fn new(source: &str, asset: ExportAsset) -> Self {
        Self {
            source: source.to_string(),
            asset,
        }
    }

    pub fn asset(&self) -> &ExportAsset {
        &self.asset
    }

    /// URL of the release metadata document
    pub fn release_url(&self) -> String {
        join_url(
            &self.source,
            &format!("pypi/{}/{}/json", self.asset.name, self.asset.version),
        )
    }

    /// Look up the file's real download URL in the release document
    pub async fn resolve(&self, origin: &OriginClient) -> Result<String> {
        let release: ReleaseDocument = origin.get_json(&self.release_url()).await?;
        find_file_url(&release, &self.asset.file_name).ok_or_else(|| {
            Error::NotFoundError(format!(
                "unable to find component: {} version: {} file: {} at: {}",
                self.asset.name, self.asset.version, self.asset.file_name, self.source
            ))
        })
    }

    pub async fn download(&self, origin: &OriginClient) -> Result<Download> {
        let url = self.resolve(origin).await?;
        origin.download(&url, &self.asset.file_name).await
    }
}

fn find_file_url(release: &ReleaseDocument, file_name: &str) -> Option<String> {
    release
        .urls
        .iter()
        .find(|file| file.filename == file_name)
        .map(|file| file.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_file_url() {
        let release: ReleaseDocument = serde_json::from_str(
            r#"{"info":{"name":"requests"},"urls":[
                {"filename":"requests-2.31.0-py3-none-any.whl","url":"https://files/whl"},
                {"filename":"requests-2.31.0.tar.gz","url":"https://files/sdist"}]}"#,
        )
        .unwrap();
        assert_eq!(
            find_file_url(&release, "requests-2.31.0.tar.gz").as_deref(),
            Some("https://files/sdist")
        );
        assert!(find_file_url(&release, "requests-2.31.0.zip").is_none());
    }

    #[test]
    fn test_release_url() {
        let asset = PypiAsset::new(
            "https://pypi.org/",
            ExportAsset {
                name: "requests".to_string(),
                version: "2.31.0".to_string(),
                file_name: "requests-2.31.0.tar.gz".to_string(),
                path: "requests/2.31.0/requests-2.31.0.tar.gz".to_string(),
                content_type: String::new(),
            },
        );
        assert_eq!(asset.release_url(), "https://pypi.org/pypi/requests/2.31.0/json");
    }
}
