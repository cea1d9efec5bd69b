// src/server/mod.rs
//! Relay broker
//!
//! Accepts export payloads from authenticated clients, uploads them in the
//! background and lets clients poll for the outcome:
//! - `GET  /service/rest/login` issues a session cookie for Basic credentials
//! - `GET  /service/rest/refresh` renews a cookie close to expiry
//! - `POST /service/rest/v1/components?repository=` submits a job
//! - `GET  /service/rest/v1/components?uuid=` polls a job
//! - `GET  /service/rest/status` and `/service/rest/version` for pre-flight

pub mod auth;
pub mod handlers;
pub mod jobs;
pub mod routes;

pub use auth::{REFRESH_WINDOW, SessionKeys, TOKEN_TTL, TokenError};
pub use jobs::JobRegistry;
pub use routes::create_router;

use crate::config::ServerSettings;
use crate::error::Result;
use crate::upload::Uploader;
use crate::version::VersionInfo;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// How often abandoned jobs are swept
const CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// Completed jobs nobody polled are dropped after this long
const ABANDONED_JOB_TTL: Duration = Duration::from_secs(24 * 3600);

/// Shared broker state
pub struct ServerState {
    pub jobs: Arc<JobRegistry>,
    pub keys: SessionKeys,
    /// Username to password map for `/login`
    pub credentials: HashMap<String, String>,
    pub uploader: Uploader,
    pub version: VersionInfo,
}

impl ServerState {
    pub fn new(settings: &ServerSettings) -> Result<Self> {
        Ok(Self {
            jobs: Arc::new(JobRegistry::new()),
            keys: SessionKeys::generate()?,
            credentials: settings.credentials.clone(),
            uploader: Uploader::new(settings.concurrency)?,
            version: VersionInfo::current(),
        })
    }

    /// Replace the uploader
    pub fn with_uploader(mut self, uploader: Uploader) -> Self {
        self.uploader = uploader;
        self
    }

    pub fn check_credentials(&self, username: &str, password: &str) -> bool {
        self.credentials
            .get(username)
            .is_some_and(|expected| expected == password)
    }
}

/// Run the broker until interrupted
pub async fn run_server(settings: &ServerSettings) -> Result<()> {
    let addr = SocketAddr::new(settings.bind_address, settings.port);
    tracing::info!("Starting relay broker on {}", addr);
    tracing::info!("Upload concurrency: {}", settings.concurrency);
    tracing::info!("Accounts: {}", settings.credentials.len());

    let state = Arc::new(ServerState::new(settings)?);

    let cleanup_jobs = state.jobs.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = cleanup_jobs.cleanup(ABANDONED_JOB_TTL);
            if removed > 0 {
                tracing::info!("Removed {} abandoned jobs", removed);
            }
        }
    });

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Broker is ready to serve");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Broker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
