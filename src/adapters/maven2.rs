// src/adapters/maven2.rs

//! Maven2 components
//!
//! A Maven component is published as one bundle: every jar, pom and
//! classifier artifact goes into a single multipart request. When the bundle
//! has no pom the destination needs the coordinates as explicit fields.

use super::{Download, MultipartBody, OriginClient, PreparedUpload};
use crate::error::{Error, Result};
use crate::export::{ExportAsset, ExportComponent};
use crate::format::{file_extension, is_checksum_sidecar, join_url};

/// Classifier of an artifact file, e.g. `sources` for `lib-1.0-sources.jar`.
///
/// Files that do not start with `name-version-` have no classifier.
pub fn asset_classifier(name: &str, version: &str, file_name: &str, extension: &str) -> String {
    let prefix = format!("{}-{}-", name, version);
    match file_name.strip_prefix(&prefix) {
        Some(rest) => rest
            .strip_suffix(&format!(".{}", extension))
            .unwrap_or(rest)
            .to_string(),
        None => String::new(),
    }
}

/// Whether any asset is a pom file
pub fn has_pom(assets: &[ExportAsset]) -> bool {
    assets
        .iter()
        .any(|asset| file_extension(&asset.file_name) == "pom")
}

pub struct Maven2Component {
    component: ExportComponent,
}

impl Maven2Component {
    /// Wrap a component, dropping checksum sidecars from its assets
    pub fn new(mut component: ExportComponent) -> Self {
        component
            .assets
            .retain(|asset| !is_checksum_sidecar(&asset.file_name));
        Self { component }
    }

    pub fn component(&self) -> &ExportComponent {
        &self.component
    }

    /// Asset paths of the bundle, comma separated; `name-version` when empty
    pub fn label(&self) -> String {
        if self.component.assets.is_empty() {
            return self.component.full_name();
        }
        self.component
            .assets
            .iter()
            .map(|asset| asset.path.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Download every remaining asset, in asset order
    pub async fn download(&self, origin: &OriginClient) -> Result<Vec<Download>> {
        if self.component.assets.is_empty() {
            return Err(Error::EmptyComponentError(format!(
                "zero valid maven artifacts were found after assets filter for component {}",
                self.component.full_name()
            )));
        }

        let mut downloads = Vec::with_capacity(self.component.assets.len());
        for asset in &self.component.assets {
            let url = join_url(&self.component.artifacts_source, &asset.path);
            downloads.push(origin.download(&url, &asset.file_name).await?);
        }
        Ok(downloads)
    }

    /// Build the bundle body: pom generation off, coordinates when there is
    /// no pom, then extension/classifier/file parts per asset.
    pub fn prepare_upload(&self, downloads: Vec<Download>) -> Result<PreparedUpload> {
        if downloads.is_empty() {
            return Err(Error::EmptyComponentError(format!(
                "zero valid maven artifacts were found after assets filter for component {}",
                self.component.full_name()
            )));
        }

        let c = &self.component;
        let mut body = MultipartBody::new();
        body.add_field("maven2.generate-pom", "false");

        if !has_pom(&c.assets) {
            body.add_field("maven2.artifactId", &c.name);
            body.add_field("maven2.groupId", c.group.as_deref().unwrap_or_default());
            body.add_field("maven2.version", &c.version);
        }

        for (i, download) in downloads.into_iter().enumerate() {
            let field = format!("maven2.asset{}", i + 1);
            let extension = file_extension(&download.file_name).to_string();
            let classifier = asset_classifier(&c.name, &c.version, &download.file_name, &extension);

            body.add_field(&format!("{field}.extension"), &extension);
            if !classifier.is_empty() {
                body.add_field(&format!("{field}.classifier"), &classifier);
            }
            body.add_file(&field, &download.file_name, download.content);
        }

        Ok(PreparedUpload {
            content_type: body.content_type(),
            body: body.finish(),
        })
    }
}
