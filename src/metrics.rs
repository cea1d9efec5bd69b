// src/metrics.rs
//! Client sync metrics
//!
//! Simple atomic counters updated by the orchestrator and logged as a
//! snapshot after every run.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Sync metrics collector
#[derive(Default)]
pub struct SyncMetrics {
    /// Whether the broker passed the last pre-flight
    broker_up: AtomicBool,
    /// Runs started
    runs: AtomicU64,
    /// Sync units found already in sync
    units_in_sync: AtomicU64,
    /// Sync units that submitted a job and saw it complete
    units_replicated: AtomicU64,
    /// Sync units aborted by an error
    units_failed: AtomicU64,
    /// Assets handed to the broker
    assets_submitted: AtomicU64,
    /// Failure lines reported back by completed jobs
    upload_failures: AtomicU64,
    /// Collector creation time
    start_time: std::sync::OnceLock<Instant>,
}

impl SyncMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        let metrics = Self::default();
        let _ = metrics.start_time.set(Instant::now());
        metrics
    }

    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broker_status(&self, up: bool) {
        self.broker_up.store(up, Ordering::Relaxed);
    }

    pub fn record_in_sync(&self) {
        self.units_in_sync.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed job and how many of its units failed
    pub fn record_replicated(&self, assets: usize, failures: usize) {
        self.units_replicated.fetch_add(1, Ordering::Relaxed);
        self.assets_submitted
            .fetch_add(assets as u64, Ordering::Relaxed);
        self.upload_failures
            .fetch_add(failures as u64, Ordering::Relaxed);
    }

    pub fn record_unit_failed(&self) {
        self.units_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = self
            .start_time
            .get()
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);

        MetricsSnapshot {
            broker_up: self.broker_up.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
            units_in_sync: self.units_in_sync.load(Ordering::Relaxed),
            units_replicated: self.units_replicated.load(Ordering::Relaxed),
            units_failed: self.units_failed.load(Ordering::Relaxed),
            assets_submitted: self.assets_submitted.load(Ordering::Relaxed),
            upload_failures: self.upload_failures.load(Ordering::Relaxed),
            uptime_secs: uptime.as_secs(),
        }
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub broker_up: bool,
    pub runs: u64,
    pub units_in_sync: u64,
    pub units_replicated: u64,
    pub units_failed: u64,
    pub assets_submitted: u64,
    pub upload_failures: u64,
    pub uptime_secs: u64,
}
