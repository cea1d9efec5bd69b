// src/format.rs
//! Component formats and the path helpers shared by every format

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Checksum sidecars that a Maven2 destination regenerates by itself
pub const CHECKSUM_EXTENSIONS: [&str; 4] = ["sha1", "md5", "sha256", "sha512"];

/// The artifact formats that can be replicated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentFormat {
    Npm,
    Pypi,
    Maven2,
    Nuget,
}

impl ComponentFormat {
    pub const ALL: [ComponentFormat; 4] = [Self::Npm, Self::Pypi, Self::Maven2, Self::Nuget];

    /// Lowercase name as used by registries and on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "pypi",
            Self::Maven2 => "maven2",
            Self::Nuget => "nuget",
        }
    }

    /// Bundled formats upload all assets of a component in one request.
    pub fn is_bundled(self) -> bool {
        matches!(self, Self::Maven2)
    }

    /// Public origin used when a sync unit does not name one
    pub fn default_artifacts_source(self) -> &'static str {
        match self {
            Self::Npm => "https://registry.npmjs.org/",
            Self::Pypi => "https://pypi.org/",
            Self::Maven2 => "https://repo1.maven.org/maven2/",
            Self::Nuget => "https://api.nuget.org/v3/index.json",
        }
    }

    /// Multipart field name carrying a single asset upload
    pub fn asset_field(self) -> String {
        format!("{}.asset", self.as_str())
    }
}

impl fmt::Display for ComponentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::ConfigError(format!("unsupported component format '{}'", s)))
    }
}

/// Last segment of a slash separated path
pub fn file_name_from_path(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Text after the last dot, or the whole name when there is none
pub fn file_extension(file_name: &str) -> &str {
    file_name.rsplit('.').next().unwrap_or(file_name)
}

/// Whether the file is a checksum sidecar such as `foo.jar.sha1`
pub fn is_checksum_sidecar(file_name: &str) -> bool {
    file_name.contains('.') && CHECKSUM_EXTENSIONS.contains(&file_extension(file_name))
}

/// Drop a `+build` metadata suffix: `1.0.0+sha.abc` becomes `1.0.0`
pub fn strip_build_metadata(version: &str) -> &str {
    version.split('+').next().unwrap_or(version)
}

/// Join an origin base URL and a relative path with exactly one slash
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format_case_insensitive() {
        assert_eq!("Maven2".parse::<ComponentFormat>().unwrap(), ComponentFormat::Maven2);
        assert_eq!("NPM".parse::<ComponentFormat>().unwrap(), ComponentFormat::Npm);
        assert!("raw".parse::<ComponentFormat>().is_err());
    }

    #[test]
    fn test_only_maven_is_bundled() {
        let bundled: Vec<_> = ComponentFormat::ALL
            .into_iter()
            .filter(|f| f.is_bundled())
            .collect();
        assert_eq!(bundled, vec![ComponentFormat::Maven2]);
    }

    #[test]
    fn test_checksum_sidecar() {
        assert!(is_checksum_sidecar("foo-1.0.jar.sha1"));
        assert!(is_checksum_sidecar("foo-1.0.pom.sha512"));
        assert!(!is_checksum_sidecar("foo-1.0.jar"));
        assert!(!is_checksum_sidecar("sha1"));
    }

    #[test]
    fn test_strip_build_metadata() {
        assert_eq!(strip_build_metadata("6.0.200+sha.53134097a"), "6.0.200");
        assert_eq!(strip_build_metadata("1.2.3"), "1.2.3");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://registry.npmjs.org/", "/left-pad/-/left-pad-1.3.0.tgz"),
            "https://registry.npmjs.org/left-pad/-/left-pad-1.3.0.tgz"
        );
        assert_eq!(join_url("http://origin", "a/b"), "http://origin/a/b");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ComponentFormat::Nuget).unwrap();
        assert_eq!(json, "\"nuget\"");
    }
}
