//! Process-wide map of in-flight jobs.
//!
//! Every transition is one read-modify-write under a single lock. The lock is
//! never held across subprocess or network I/O.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::error::TranscodeError;
use super::model::{Job, JobPhase, JobStatus};
use super::progress::MAX_RUNNING_PERCENTAGE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("job {0} is not registered")]
    UnknownJob(Uuid),

    #[error("job {id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: Uuid,
        from: &'static str,
        to: &'static str,
    },

    #[error("job {0} is already registered")]
    Duplicate(Uuid),
}

#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the job in the probing phase.
    pub async fn register(&self, id: Uuid) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        jobs.insert(id, Job::new(id));
        Ok(())
    }

    /// Probing -> Encoding, progress restarts at 0 under the new denominator.
    pub async fn start_encoding(&self, id: Uuid, total_frames: NonZeroU64) -> Result<(), RegistryError> {
        self.transition(id, "encoding", |phase| match phase {
            JobPhase::Probing => Some(JobPhase::Encoding {
                total_frames,
                progress: 0,
            }),
            _ => None,
        })
        .await
    }

    /// Raises the encode percentage. Lower values are ignored and the value
    /// never passes 99 while encoding. Returns the stored percentage.
    pub async fn record_progress(&self, id: Uuid, percentage: u8) -> Result<u8, RegistryError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(RegistryError::UnknownJob(id))?;

        match &mut job.phase {
            JobPhase::Encoding { progress, .. } => {
                *progress = (*progress).max(percentage.min(MAX_RUNNING_PERCENTAGE));
                Ok(*progress)
            }
            other => Err(RegistryError::IllegalTransition {
                id,
                from: other.name(),
                to: "encoding",
            }),
        }
    }

    /// Encoding -> Done.
    pub async fn complete(&self, id: Uuid, cid: String, length: u64) -> Result<(), RegistryError> {
        self.transition(id, "done", move |phase| match phase {
            JobPhase::Encoding { .. } => Some(JobPhase::Done { cid, length }),
            _ => None,
        })
        .await
    }

    /// Probing | Encoding -> Failed. A job that already reached a terminal
    /// phase keeps its original outcome.
    pub async fn fail(&self, id: Uuid, error: TranscodeError) -> Result<(), RegistryError> {
        self.transition(id, "failed", move |phase| {
            (!phase.is_terminal()).then_some(JobPhase::Failed { error })
        })
        .await
    }

    /// Reports the job's status. Terminal results are removed in the same
    /// critical section, so each is delivered exactly once.
    pub async fn take_status(&self, id: Uuid) -> JobStatus {
        let mut jobs = self.jobs.lock().await;

        let status = match jobs.get(&id).map(|job| &job.phase) {
            None => return JobStatus::NotFound,
            Some(JobPhase::Probing) => JobStatus::InProgress { percentage: 0 },
            Some(JobPhase::Encoding { progress, .. }) => JobStatus::InProgress {
                percentage: *progress,
            },
            Some(JobPhase::Done { cid, length }) => JobStatus::Done {
                cid: cid.clone(),
                length: *length,
            },
            Some(JobPhase::Failed { error }) => JobStatus::Failed {
                error: error.clone(),
            },
        };

        if matches!(status, JobStatus::Done { .. } | JobStatus::Failed { .. }) {
            jobs.remove(&id);
        }
        status
    }

    async fn transition<F>(&self, id: Uuid, to: &'static str, next: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&JobPhase) -> Option<JobPhase>,
    {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(RegistryError::UnknownJob(id))?;

        match next(&job.phase) {
            Some(phase) => {
                if phase.is_terminal() {
                    info!(
                        "Job {} is {} after {} ms",
                        job.id,
                        phase.name(),
                        job.age().whole_milliseconds()
                    );
                }
                job.phase = phase;
                Ok(())
            }
            None => Err(RegistryError::IllegalTransition {
                id,
                from: job.phase.name(),
                to,
            }),
        }
    }
}

#[cfg(test)]
impl JobRegistry {
    /// Current phase without side effects.
    pub async fn phase(&self, id: Uuid) -> Option<JobPhase> {
        self.jobs.lock().await.get(&id).map(|job| job.phase.clone())
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }
}
