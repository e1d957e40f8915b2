use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("request to content store failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("content store returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid content store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("content store response has no entry for {0:?}")]
    MissingEntry(String),
}

/// Content-addressed storage that returns an identifier for added data.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Adds a directory tree and returns the identifier of its root.
    async fn add_directory(&self, path: &Path) -> Result<String, StoreError>;

    async fn add_file(&self, path: &Path) -> Result<String, StoreError>;
}
