// src/server/jobs.rs
//! Replication job tracking
//!
//! Handles the submit-then-poll pattern:
//! - A submission creates an incomplete job and returns its id at once
//! - The upload task completes the job exactly once with its messages
//! - The first poll that sees a completed job removes it
//! - Completed jobs that nobody polls are cleaned up after a TTL

use crate::error::{Error, Result};
use crate::job::{Job, JobId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct JobEntry {
    job: Job,
    completed_at: Option<Instant>,
}

/// Mutex-guarded table of in-flight jobs
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh incomplete job and return a copy of it
    pub fn create(&self) -> Job {
        let job = Job {
            id: JobId::new(),
            response: Vec::new(),
            complete: false,
        };
        self.jobs.lock().insert(
            job.id,
            JobEntry {
                job: job.clone(),
                completed_at: None,
            },
        );
        job
    }

    /// Current state of a job
    pub fn get(&self, id: &JobId) -> Result<Job> {
        self.jobs
            .lock()
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| Error::NotFoundError(format!("job {id}")))
    }

    /// Mark a job complete with its final messages.
    ///
    /// Must be called once per job; a job that was already removed yields
    /// `NotFoundError`.
    pub fn complete(&self, id: &JobId, messages: Vec<String>) -> Result<()> {
        let mut jobs = self.jobs.lock();
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| Error::NotFoundError(format!("job {id}")))?;
        entry.job.response = messages;
        entry.job.complete = true;
        entry.completed_at = Some(Instant::now());
        Ok(())
    }

    /// Read a job for a poller, removing it if it is complete.
    ///
    /// Lookup and removal happen under one lock, so a completion is handed
    /// to exactly one poll.
    pub fn observe(&self, id: &JobId) -> Result<Job> {
        let mut jobs = self.jobs.lock();
        let complete = jobs
            .get(id)
            .map(|entry| entry.job.complete)
            .ok_or_else(|| Error::NotFoundError(format!("job {id}")))?;

        if complete {
            jobs.remove(id)
                .map(|entry| entry.job)
                .ok_or_else(|| Error::NotFoundError(format!("job {id}")))
        } else {
            Ok(jobs[id].job.clone())
        }
    }

    /// Drop completed jobs that were never polled within `ttl`
    pub fn cleanup(&self, ttl: Duration) -> usize {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, entry| {
            entry
                .completed_at
                .is_none_or(|completed| completed.elapsed() < ttl)
        });
        before - jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}
