// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use nexus_relay::adapters::OriginClient;
use nexus_relay::client::SessionOptions;
use nexus_relay::config::ServerSettings;
use nexus_relay::export::{ExportAsset, ExportComponent, ExportComponents};
use nexus_relay::format::ComponentFormat;
use nexus_relay::http::RetryClient;
use nexus_relay::registry::{Asset, Component, RegistryServer};
use nexus_relay::server::{ServerState, create_router};
use nexus_relay::upload::Uploader;
use std::sync::Arc;
use std::time::Duration;

pub const BROKER_USER: &str = "relay";
pub const BROKER_PASS: &str = "relay-pass";

/// Client that gives up after the first attempt
pub fn fast_client() -> RetryClient {
    RetryClient::new(Duration::from_secs(10))
        .unwrap()
        .with_retries(1, Duration::ZERO)
}

/// Origin client that gives up after the first attempt
pub fn fast_origin() -> OriginClient {
    OriginClient::with_clients(fast_client(), fast_client())
}

/// Poll quickly so tests finish in milliseconds
pub fn fast_session_options() -> SessionOptions {
    SessionOptions {
        poll_interval: Duration::from_millis(20),
        max_polls: 500,
        ..SessionOptions::default()
    }
}

/// Start a broker on an ephemeral port and return its base URL.
///
/// The broker task lives until the test's runtime shuts down.
pub async fn start_broker() -> String {
    let mut settings = ServerSettings::default();
    settings
        .credentials
        .insert(BROKER_USER.to_string(), BROKER_PASS.to_string());
    settings.concurrency = 4;

    let state = ServerState::new(&settings)
        .unwrap()
        .with_uploader(Uploader::new(4).unwrap().with_origin(fast_origin()));
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Catalog component with one asset per path
pub fn component(format: &str, name: &str, version: &str, paths: &[&str]) -> Component {
    Component {
        id: format!("{name}-{version}"),
        repository: "source".to_string(),
        format: format.to_string(),
        group: None,
        name: name.to_string(),
        version: version.to_string(),
        assets: paths
            .iter()
            .map(|path| Asset {
                download_url: format!("http://registry/{path}"),
                path: path.to_string(),
                id: path.to_string(),
                repository: "source".to_string(),
                format: format.to_string(),
                content_type: "application/octet-stream".to_string(),
            })
            .collect(),
    }
}

/// Export payload with a single component
pub fn export_of(
    destination: &str,
    format: ComponentFormat,
    source: &str,
    name: &str,
    version: &str,
    paths: &[&str],
) -> ExportComponents {
    ExportComponents {
        nexus_server: RegistryServer::new(destination, "writer", "writer-pass"),
        items: vec![ExportComponent {
            name: name.to_string(),
            version: version.to_string(),
            repository: "source".to_string(),
            format,
            group: None,
            artifacts_source: source.to_string(),
            assets: paths
                .iter()
                .map(|path| ExportAsset {
                    name: name.to_string(),
                    version: version.to_string(),
                    file_name: nexus_relay::format::file_name_from_path(path).to_string(),
                    path: path.to_string(),
                    content_type: String::new(),
                })
                .collect(),
        }],
    }
}

/// Body of the repository listing endpoint
pub fn repositories_json(entries: &[(&str, &str)]) -> serde_json::Value {
    serde_json::Value::Array(
        entries
            .iter()
            .map(|(name, format)| {
                serde_json::json!({
                    "name": name,
                    "format": format,
                    "type": "hosted",
                    "url": format!("http://registry/repository/{name}"),
                })
            })
            .collect(),
    )
}
