use thiserror::Error;

/// Terminal failure recorded on a job. Never retried; delivered once through
/// the status query and then forgotten.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeError {
    #[error("probe failed: {0}")]
    Probe(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("ingest failed: {0}")]
    Ingest(String),
}

impl TranscodeError {
    pub fn probe(message: impl Into<String>) -> Self {
        Self::Probe(message.into())
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    pub fn ingest(message: impl Into<String>) -> Self {
        Self::Ingest(message.into())
    }

    /// Short machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            TranscodeError::Probe(_) => "probe_failure",
            TranscodeError::Encode(_) => "encode_failure",
            TranscodeError::Ingest(_) => "ingest_failure",
        }
    }
}
