// src/lib.rs

//! nexus-relay
//!
//! Replicates artifact repositories between Nexus-compatible registries.
//!
//! # Architecture
//!
//! - Client: reads the source and destination catalogs, diffs them and
//!   submits the missing components to a broker as one export payload
//! - Broker: authenticates clients, uploads each payload in the background
//!   and reports per-asset outcomes through a pollable job
//! - Adapters: per-format (NPM, PyPI, NuGet, Maven2) origin download and
//!   upload body construction

pub mod adapters;
pub mod client;
pub mod config;
pub mod diff;
mod error;
pub mod export;
pub mod format;
pub mod http;
pub mod job;
pub mod metrics;
pub mod registry;
pub mod token;
pub mod upload;
pub mod version;

#[cfg(feature = "server")]
pub mod server;

pub use client::{SyncOrchestrator, SyncOutcome};
pub use config::{ClientSettings, Config, ServerSettings, SyncUnit};
pub use diff::diff_catalogs;
pub use error::{Error, Result};
pub use export::{ExportAsset, ExportComponent, ExportComponents};
pub use format::ComponentFormat;
pub use job::{Job, JobId};
pub use registry::{Asset, CatalogReader, Component, RegistryServer};
pub use upload::Uploader;
