use std::num::NonZeroU64;

use time::OffsetDateTime;
use uuid::Uuid;

use super::error::TranscodeError;

/// Lifecycle of a transcode job. Terminal phases carry their result, so a
/// content id can never coexist with a running encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    /// Waiting for duration, frame rate and geometry.
    Probing,
    Encoding {
        total_frames: NonZeroU64,
        /// Percentage in `0..=99`.
        progress: u8,
    },
    Done {
        cid: String,
        /// Source duration in whole seconds, rounded up.
        length: u64,
    },
    Failed {
        error: TranscodeError,
    },
}

impl JobPhase {
    pub fn name(&self) -> &'static str {
        match self {
            JobPhase::Probing => "probing",
            JobPhase::Encoding { .. } => "encoding",
            JobPhase::Done { .. } => "done",
            JobPhase::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Done { .. } | JobPhase::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub phase: JobPhase,
    pub created_at: OffsetDateTime,
}

impl Job {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            phase: JobPhase::Probing,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Time since registration.
    pub fn age(&self) -> time::Duration {
        OffsetDateTime::now_utc() - self.created_at
    }
}

/// Answer to a status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Unknown id, or the terminal result was already delivered.
    NotFound,
    InProgress { percentage: u8 },
    Done { cid: String, length: u64 },
    Failed { error: TranscodeError },
}
