// src/client/mod.rs
//! Sync orchestrator
//!
//! For every configured sync unit: check both repositories, read both
//! catalogs concurrently, diff them, and hand any difference to the broker.
//! Units run concurrently and fail independently of each other.

pub mod session;

pub use session::{BrokerSession, SessionCredential, SessionOptions};

use crate::config::{ClientSettings, SyncUnit};
use crate::diff::{asset_count, diff_catalogs};
use crate::error::{Error, Result};
use crate::export::ExportComponents;
use crate::http::{METADATA_TIMEOUT, RetryClient};
use crate::metrics::SyncMetrics;
use crate::registry::{CatalogReader, Component, check_repository};
use crate::upload::UPLOAD_ERROR_PREFIX;
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Result of one sync unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing was missing at the destination
    InSync,
    /// A job ran; `failures` lists the assets the broker could not upload
    Replicated {
        components: usize,
        assets: usize,
        failures: Vec<String>,
    },
}

/// Runs sync units against the broker
pub struct SyncOrchestrator {
    settings: ClientSettings,
    units: Vec<SyncUnit>,
    registry_client: RetryClient,
    session_options: SessionOptions,
    metrics: SyncMetrics,
}

impl SyncOrchestrator {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let units = settings
            .sync_units()
            .map_err(|e| Error::ConfigError(format!("{e:#}")))?;
        Ok(Self {
            settings,
            units,
            registry_client: RetryClient::new(METADATA_TIMEOUT)?,
            session_options: SessionOptions::default(),
            metrics: SyncMetrics::new(),
        })
    }

    pub fn with_session_options(mut self, options: SessionOptions) -> Self {
        self.session_options = options;
        self
    }

    /// Replace the client used for catalog and repository requests
    pub fn with_registry_client(mut self, client: RetryClient) -> Self {
        self.registry_client = client;
        self
    }

    pub fn units(&self) -> &[SyncUnit] {
        &self.units
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    fn session(&self) -> Result<BrokerSession> {
        Ok(BrokerSession::new(
            &self.settings.server,
            &self.settings.server_auth.user,
            &self.settings.server_auth.pass,
        )?
        .with_options(self.session_options.clone()))
    }

    /// Make sure the broker is up and runs the same release
    pub async fn preflight(&self) -> Result<()> {
        let session = self.session()?;
        let result = async {
            session.check_status().await?;
            let remote = session.fetch_version().await?;
            if !remote.is_compatible() {
                return Err(Error::ConfigError(format!(
                    "broker at {} runs version {} (build {}), this client is {}; please update",
                    self.settings.server,
                    remote.version,
                    remote.build,
                    crate::version::VERSION
                )));
            }
            Ok(())
        }
        .await;
        self.metrics.record_broker_status(result.is_ok());
        result
    }

    /// Run every sync unit once.
    ///
    /// A broker pre-flight failure aborts the run; otherwise each unit's
    /// result is returned in configuration order.
    pub async fn run_once(&self) -> Result<Vec<Result<SyncOutcome>>> {
        self.metrics.record_run();
        self.preflight().await?;

        let outcomes = join_all(self.units.iter().map(|unit| async move {
            let result = self.sync_unit(unit).await;
            if let Err(e) = &result {
                self.metrics.record_unit_failed();
                error!(
                    "Sync of '{}' at {} into '{}' at {} failed: {}",
                    unit.source_repo, unit.source.host, unit.destination_repo, unit.destination.host, e
                );
            }
            result
        }))
        .await;

        let snapshot = self.metrics.snapshot();
        info!(
            "Run finished: {} in sync, {} replicated, {} failed, {} upload failures so far",
            snapshot.units_in_sync,
            snapshot.units_replicated,
            snapshot.units_failed,
            snapshot.upload_failures
        );
        Ok(outcomes)
    }

    /// Run every `every` until interrupted
    pub async fn run_scheduled(&self, every: Duration) -> Result<()> {
        info!("Daemon mode: syncing every {} minutes", every.as_secs() / 60);
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("Sync run aborted: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down sync daemon");
                    return Ok(());
                }
            }
        }
    }

    /// Check, read, diff and replicate one sync unit
    pub async fn sync_unit(&self, unit: &SyncUnit) -> Result<SyncOutcome> {
        info!(
            "Comparing {} repository '{}' at {} with '{}' at {}",
            unit.format, unit.source_repo, unit.source.host, unit.destination_repo, unit.destination.host
        );

        tokio::try_join!(
            check_repository(&self.registry_client, &unit.source, &unit.source_repo, unit.format),
            check_repository(
                &self.registry_client,
                &unit.destination,
                &unit.destination_repo,
                unit.format
            ),
        )?;

        let (source, destination) = self.read_catalogs(unit).await?;
        let diff = diff_catalogs(&source, &destination);

        if diff.is_empty() {
            info!(
                "'{}' repo at server {} is in sync with repo '{}' at server {}, nothing to do.",
                unit.source_repo, unit.source.host, unit.destination_repo, unit.destination.host
            );
            self.metrics.record_in_sync();
            return Ok(SyncOutcome::InSync);
        }

        let assets = asset_count(&diff);
        info!(
            "{} components ({} assets) of '{}' are missing from '{}' at {}",
            diff.len(),
            assets,
            unit.source_repo,
            unit.destination_repo,
            unit.destination.host
        );

        let export = ExportComponents::from_diff(
            &diff,
            unit.format,
            &unit.artifacts_source,
            unit.destination.clone(),
        );
        let mut session = self.session()?;
        let messages = session.replicate(&export, &unit.destination_repo).await?;

        let failures: Vec<String> = messages
            .into_iter()
            .filter(|message| message.starts_with(UPLOAD_ERROR_PREFIX))
            .collect();
        if failures.is_empty() {
            info!(
                "All {} assets uploaded to '{}' at {}",
                assets, unit.destination_repo, unit.destination.host
            );
        } else {
            warn!(
                "{} of {} upload units failed for '{}' at {}",
                failures.len(),
                assets,
                unit.destination_repo,
                unit.destination.host
            );
            for failure in &failures {
                warn!("{}", failure);
            }
        }
        self.metrics.record_replicated(assets, failures.len());

        Ok(SyncOutcome::Replicated {
            components: diff.len(),
            assets,
            failures,
        })
    }

    /// Read both catalogs concurrently; the first failure cancels the other
    async fn read_catalogs(&self, unit: &SyncUnit) -> Result<(Vec<Component>, Vec<Component>)> {
        let cancel = CancellationToken::new();
        let source = CatalogReader::with_client(unit.source.clone(), self.registry_client.clone());
        let destination =
            CatalogReader::with_client(unit.destination.clone(), self.registry_client.clone());

        tokio::try_join!(
            cancel_on_error(&cancel, source.fetch_all(&unit.source_repo, &cancel)),
            cancel_on_error(&cancel, destination.fetch_all(&unit.destination_repo, &cancel)),
        )
    }
}

async fn cancel_on_error<T>(
    cancel: &CancellationToken,
    read: impl Future<Output = Result<T>>,
) -> Result<T> {
    let result = read.await;
    if result.is_err() {
        cancel.cancel();
    }
    result
}
