// src/export.rs

//! Export payload submitted to the broker
//!
//! The diff is projected into a self-contained request: the destination
//! registry with its credentials, and for every component the origin base URL
//! its bytes should be fetched from.

use crate::format::{self, ComponentFormat};
use crate::registry::{Component, RegistryServer};
use serde::{Deserialize, Serialize};

/// Payload of a job submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportComponents {
    pub nexus_server: RegistryServer,
    #[serde(default)]
    pub items: Vec<ExportComponent>,
}

/// A component to upload, tagged with its format and origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportComponent {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub repository: String,
    pub format: ComponentFormat,
    #[serde(default)]
    pub group: Option<String>,
    pub artifacts_source: String,
    #[serde(default)]
    pub assets: Vec<ExportAsset>,
}

impl ExportComponent {
    /// `name-version`, used to label bundled uploads
    pub fn full_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// One file of an exported component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportAsset {
    pub name: String,
    pub version: String,
    pub file_name: String,
    pub path: String,
    #[serde(default)]
    pub content_type: String,
}

impl ExportComponents {
    /// Project a diff into a submission for `destination`.
    pub fn from_diff(
        diff: &[Component],
        format: ComponentFormat,
        artifacts_source: &str,
        destination: RegistryServer,
    ) -> Self {
        let items = diff
            .iter()
            .map(|component| ExportComponent {
                name: component.name.clone(),
                version: component.version.clone(),
                repository: component.repository.clone(),
                format,
                group: component.group.clone(),
                artifacts_source: artifacts_source.to_string(),
                assets: component
                    .assets
                    .iter()
                    .map(|asset| ExportAsset {
                        name: component.name.clone(),
                        version: component.version.clone(),
                        file_name: format::file_name_from_path(&asset.path).to_string(),
                        path: asset.path.clone(),
                        content_type: asset.content_type.clone(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            nexus_server: destination,
            items,
        }
    }

    /// Number of assets in the payload
    pub fn asset_count(&self) -> usize {
        self.items.iter().map(|c| c.assets.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Asset;

    fn diff() -> Vec<Component> {
        vec![Component {
            id: "id1".to_string(),
            repository: "maven-central".to_string(),
            format: "maven2".to_string(),
            group: Some("org.example".to_string()),
            name: "lib".to_string(),
            version: "1.0".to_string(),
            assets: vec![Asset {
                download_url: "http://src/lib-1.0.jar".to_string(),
                path: "org/example/lib/1.0/lib-1.0.jar".to_string(),
                id: "a1".to_string(),
                repository: "maven-central".to_string(),
                format: "maven2".to_string(),
                content_type: "application/java-archive".to_string(),
            }],
        }]
    }

    #[test]
    fn test_from_diff_projection() {
        let dst = RegistryServer::new("http://dst", "u", "p");
        let export = ExportComponents::from_diff(
            &diff(),
            ComponentFormat::Maven2,
            "https://repo1.maven.org/maven2/",
            dst.clone(),
        );
        assert_eq!(export.nexus_server, dst);
        assert_eq!(export.items.len(), 1);
        let item = &export.items[0];
        assert_eq!(item.full_name(), "lib-1.0");
        assert_eq!(item.group.as_deref(), Some("org.example"));
        assert_eq!(item.assets[0].file_name, "lib-1.0.jar");
        assert_eq!(item.assets[0].name, "lib");
        assert_eq!(export.asset_count(), 1);
    }

    #[test]
    fn test_wire_shape() {
        let export = ExportComponents::from_diff(
            &diff(),
            ComponentFormat::Maven2,
            "https://repo1.maven.org/maven2/",
            RegistryServer::new("http://dst", "u", "p"),
        );
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["nexusServer"]["host"], "http://dst");
        assert_eq!(json["items"][0]["artifactsSource"], "https://repo1.maven.org/maven2/");
        assert_eq!(json["items"][0]["format"], "maven2");
        assert_eq!(json["items"][0]["assets"][0]["fileName"], "lib-1.0.jar");

        let back: ExportComponents = serde_json::from_value(json).unwrap();
        assert_eq!(back, export);
    }
}
