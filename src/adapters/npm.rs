// src/adapters/npm.rs

//! NPM tarballs: the asset path below the registry root is the download path.

use super::{Download, OriginClient};
use crate::error::Result;
use crate::export::ExportAsset;
use crate::format::join_url;

pub struct NpmAsset {
    source: String,
    asset: ExportAsset,
}

impl NpmAsset {
    pub fn new(source: &str, asset: ExportAsset) -> Self {
        Self {
            source: source.to_string(),
            asset,
        }
    }

    pub fn asset(&self) -> &ExportAsset {
        &self.asset
    }

    pub fn download_url(&self) -> String {
        join_url(&self.source, &self.asset.path)
    }

    /// Scoped packages keep their `@scope` in the path but not in the file name
    pub fn file_name(&self) -> &str {
        self.asset.file_name.trim_matches('@')
    }

    pub async fn download(&self, origin: &OriginClient) -> Result<Download> {
        origin.download(&self.download_url(), self.file_name()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_package_url() {
        let asset = NpmAsset::new(
            "https://registry.npmjs.org/",
            ExportAsset {
                name: "@babel/core".to_string(),
                version: "7.0.0".to_string(),
                file_name: "core-7.0.0.tgz".to_string(),
                path: "@babel/core/-/core-7.0.0.tgz".to_string(),
                content_type: "application/x-tgz".to_string(),
            },
        );
        assert_eq!(
            asset.download_url(),
            "https://registry.npmjs.org/@babel/core/-/core-7.0.0.tgz"
        );
        assert_eq!(asset.file_name(), "core-7.0.0.tgz");
    }
}
