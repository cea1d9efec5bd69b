// src/config.rs
//! Configuration file parsing
//!
//! One TOML file configures either role:
//! - [server] - Broker bind address, upload concurrency, accounts
//! - [client] - Broker URL and credentials, daemon schedule
//! - [client.sync_global_auth] - Defaults for every sync unit's servers
//! - [[client.sync_configs]] - Source/destination repository pairs

use crate::format::ComponentFormat;
use crate::registry::RegistryServer;
use crate::upload::DEFAULT_CONCURRENCY;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Broker settings
    #[serde(default)]
    pub server: Option<ServerSettings>,

    /// Client settings
    #[serde(default)]
    pub client: Option<ClientSettings>,
}

/// Broker section
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upload units running at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Username to password map accepted by `/login`
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            concurrency: default_concurrency(),
            credentials: HashMap::new(),
        }
    }
}

/// Client section
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    /// Broker base URL, e.g. `http://relay:8181`
    pub server: String,

    pub server_auth: Credentials,

    #[serde(default)]
    pub daemon: DaemonSettings,

    #[serde(default)]
    pub sync_global_auth: GlobalAuth,

    #[serde(default)]
    pub sync_configs: Vec<SyncConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_sync_every_minutes")]
    pub sync_every_minutes: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sync_every_minutes: default_sync_every_minutes(),
        }
    }
}

impl DaemonSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync_every_minutes * 60)
    }
}

/// Server and credential defaults inherited by every sync unit
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalAuth {
    pub src_server: Option<String>,
    pub src_server_user: Option<String>,
    pub src_server_pass: Option<String>,
    pub dst_server: Option<String>,
    pub dst_server_user: Option<String>,
    pub dst_server_pass: Option<String>,
}

/// One side of a sync unit as written in the file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryEndpoint {
    pub server: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
    #[serde(default)]
    pub repo_name: String,
}

/// A sync unit as written in the file
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub format: ComponentFormat,
    pub artifacts_source: Option<String>,
    #[serde(default)]
    pub src_server_config: RepositoryEndpoint,
    #[serde(default)]
    pub dst_server_config: RepositoryEndpoint,
}

/// A fully resolved sync unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncUnit {
    pub format: ComponentFormat,
    pub artifacts_source: String,
    pub source: RegistryServer,
    pub source_repo: String,
    pub destination: RegistryServer,
    pub destination_repo: String,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8181
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_sync_every_minutes() -> u64 {
    30
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.is_none() && self.client.is_none() {
            anyhow::bail!("configuration needs a [server] or a [client] section");
        }
        if let Some(server) = &self.server {
            server.validate()?;
        }
        if let Some(client) = &self.client {
            client.validate()?;
        }
        Ok(())
    }
}

impl ServerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.credentials.is_empty() {
            anyhow::bail!("server.credentials must contain at least one account");
        }
        if self.concurrency == 0 {
            anyhow::bail!("server.concurrency must be greater than zero");
        }
        Ok(())
    }
}

impl ClientSettings {
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.server)
            .with_context(|| format!("Invalid client.server URL: {}", self.server))?;
        if self.server_auth.user.is_empty() {
            anyhow::bail!("client.server_auth.user must not be empty");
        }
        if self.daemon.enabled && self.daemon.sync_every_minutes == 0 {
            anyhow::bail!("client.daemon.sync_every_minutes must be greater than zero");
        }
        if self.sync_configs.is_empty() {
            anyhow::bail!("client.sync_configs must contain at least one entry");
        }
        self.sync_units()?;
        Ok(())
    }

    /// Resolve every sync unit, filling gaps from the global defaults
    pub fn sync_units(&self) -> Result<Vec<SyncUnit>> {
        self.sync_configs
            .iter()
            .enumerate()
            .map(|(i, config)| self.resolve(i, config))
            .collect()
    }

    fn resolve(&self, index: usize, config: &SyncConfig) -> Result<SyncUnit> {
        let global = &self.sync_global_auth;
        let src = &config.src_server_config;
        let dst = &config.dst_server_config;
        let key = |name: &str| format!("client.sync_configs[{index}].{name}");

        let pick = |own: &Option<String>, fallback: &Option<String>, name: &str| {
            own.as_ref()
                .filter(|value| !value.is_empty())
                .or(fallback.as_ref().filter(|value| !value.is_empty()))
                .cloned()
                .with_context(|| {
                    format!("{} is not set and has no client.sync_global_auth default", key(name))
                })
        };

        let source = RegistryServer::new(
            &pick(&src.server, &global.src_server, "src_server_config.server")?,
            &pick(&src.user, &global.src_server_user, "src_server_config.user")?,
            &pick(&src.pass, &global.src_server_pass, "src_server_config.pass")?,
        );
        let destination = RegistryServer::new(
            &pick(&dst.server, &global.dst_server, "dst_server_config.server")?,
            &pick(&dst.user, &global.dst_server_user, "dst_server_config.user")?,
            &pick(&dst.pass, &global.dst_server_pass, "dst_server_config.pass")?,
        );

        if src.repo_name.is_empty() {
            anyhow::bail!("{} must not be empty", key("src_server_config.repo_name"));
        }
        if dst.repo_name.is_empty() {
            anyhow::bail!("{} must not be empty", key("dst_server_config.repo_name"));
        }

        let artifacts_source = config
            .artifacts_source
            .clone()
            .filter(|source| !source.is_empty())
            .unwrap_or_else(|| config.format.default_artifacts_source().to_string());

        Ok(SyncUnit {
            format: config.format,
            artifacts_source,
            source,
            source_repo: src.repo_name.clone(),
            destination,
            destination_repo: dst.repo_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CLIENT_CONFIG: &str = r#"
[client]
server = "http://relay:8181"

[client.server_auth]
user = "relay"
pass = "relay-pass"

[client.daemon]
enabled = true
sync_every_minutes = 10

[client.sync_global_auth]
src_server = "http://src:8081"
src_server_user = "reader"
src_server_pass = "reader-pass"
dst_server = "http://dst:8081"
dst_server_user = "writer"
dst_server_pass = "writer-pass"

[[client.sync_configs]]
format = "npm"
[client.sync_configs.src_server_config]
repo_name = "npm-proxy"
[client.sync_configs.dst_server_config]
repo_name = "npm-hosted"
user = "npm-writer"

[[client.sync_configs]]
format = "maven2"
artifacts_source = "https://mirror.example.com/maven2/"
[client.sync_configs.src_server_config]
server = "http://other-src:8081"
repo_name = "maven-central"
[client.sync_configs.dst_server_config]
repo_name = "maven-releases"
"#;

    #[test]
    fn test_client_units_inherit_global_auth() {
        let config: Config = toml::from_str(CLIENT_CONFIG).unwrap();
        config.validate().unwrap();
        let client = config.client.unwrap();
        let units = client.sync_units().unwrap();
        assert_eq!(units.len(), 2);

        assert_eq!(units[0].format, ComponentFormat::Npm);
        assert_eq!(units[0].artifacts_source, "https://registry.npmjs.org/");
        assert_eq!(units[0].source.host, "http://src:8081");
        assert_eq!(units[0].source.username, "reader");
        assert_eq!(units[0].destination.username, "npm-writer");
        assert_eq!(units[0].destination.password, "writer-pass");

        assert_eq!(units[1].artifacts_source, "https://mirror.example.com/maven2/");
        assert_eq!(units[1].source.host, "http://other-src:8081");
        assert_eq!(units[1].destination_repo, "maven-releases");
        assert_eq!(client.daemon.interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_missing_server_without_default_fails() {
        let text = CLIENT_CONFIG.replace("dst_server = \"http://dst:8081\"\n", "");
        let config: Config = toml::from_str(&text).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("dst_server_config.server"), "{err}");
    }

    #[test]
    fn test_unknown_format_rejected() {
        let text = CLIENT_CONFIG.replace("format = \"npm\"", "format = \"raw\"");
        assert!(toml::from_str::<Config>(&text).is_err());
    }

    #[test]
    fn test_server_defaults() {
        let config: Config = toml::from_str(
            r#"
[server.credentials]
admin = "secret"
"#,
        )
        .unwrap();
        config.validate().unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.port, 8181);
        assert_eq!(server.concurrency, 30);
        assert_eq!(server.bind_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn test_server_without_accounts_rejected() {
        let config: Config = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_config_rejected() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CLIENT_CONFIG.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!(config.client.is_some());
        assert!(config.server.is_none());
    }
}
