use serde::Serialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::model::JobStatus;

/// Progress value reported once a job has finished, successfully or not.
pub const TERMINAL_PROGRESS: i64 = -1;

#[derive(Debug, Serialize, ToSchema)]
pub struct StartEncodingResponse {
    pub id: Uuid,
}

#[derive(Debug, serde::Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusQuery {
    /// Job id returned by the upload
    pub id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct EncodingStatusResponse {
    pub finished: bool,
    /// Percentage while encoding, -1 once finished
    pub progress: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EncodingStatusResponse {
    /// `None` for an unknown job.
    pub fn from_status(status: JobStatus) -> Option<Self> {
        let response = match status {
            JobStatus::NotFound => return None,
            JobStatus::InProgress { percentage } => Self {
                finished: false,
                progress: i64::from(percentage),
                cid: None,
                length: None,
                error: None,
            },
            JobStatus::Done { cid, length } => Self {
                finished: true,
                progress: TERMINAL_PROGRESS,
                cid: Some(cid),
                length: Some(length),
                error: None,
            },
            JobStatus::Failed { error } => Self {
                finished: true,
                progress: TERMINAL_PROGRESS,
                cid: None,
                length: None,
                error: Some(error.to_string()),
            },
        };
        Some(response)
    }
}
