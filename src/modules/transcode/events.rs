use std::path::PathBuf;

use uuid::Uuid;

/// Work handed from submission to the pipeline task.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub job_id: Uuid,
    /// Scratch copy of the upload; removed when the job ends.
    pub source: PathBuf,
}
