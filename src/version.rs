// src/version.rs
//! Version handshake between client and broker

use serde::{Deserialize, Serialize};

/// Crate version, compared verbatim by the client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build identifier stamped by build.rs
pub const BUILD: &str = match option_env!("NEXUS_RELAY_BUILD") {
    Some(build) => build,
    None => "dev",
};

/// Body of the broker's `/version` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    #[serde(default)]
    pub build: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION.to_string(),
            build: BUILD.to_string(),
        }
    }

    /// Client and broker must run the same release
    pub fn is_compatible(&self) -> bool {
        self.version == VERSION
    }
}
