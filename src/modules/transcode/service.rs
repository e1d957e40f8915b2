use std::path::PathBuf;

use tracing::info;
use uuid::Uuid;

use super::events::TranscodeJob;
use super::model::JobStatus;
use crate::state::AppState;
use crate::workers::transcoder;

pub struct TranscodeService;

impl TranscodeService {
    /// Registers a job for `source` and starts its pipeline. Returns without
    /// waiting for any probing or encoding.
    pub async fn submit(state: AppState, source: PathBuf) -> Uuid {
        let job_id = loop {
            let id = Uuid::new_v4();
            if state.jobs.register(id).await.is_ok() {
                break id;
            }
        };

        info!("Queued job {} for {}", job_id, source.display());
        transcoder::spawn_job(state, TranscodeJob { job_id, source });

        job_id
    }

    /// Current status of a job. Terminal results are handed out once.
    pub async fn query(state: AppState, id: Uuid) -> JobStatus {
        state.jobs.take_status(id).await
    }
}
