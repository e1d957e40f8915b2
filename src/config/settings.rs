use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::env::{self, EnvKey};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    /// Root for scratch uploads and per-job HLS output.
    pub temp_video_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub ipfs_api_url: Url,
    pub ipfs_pin: bool,
    pub ipfs_cid_version: u8,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let ipfs_api_url = env::get_or(EnvKey::IpfsApiUrl, "http://127.0.0.1:5001");
        let ipfs_api_url = Url::parse(&ipfs_api_url).map_err(|source| ConfigError::InvalidUrl {
            key: EnvKey::IpfsApiUrl.as_str(),
            source,
        })?;

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 10000),
            temp_video_dir: env::get_or(EnvKey::TempVideoDir, "/tmp/transcoder").into(),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg").into(),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe").into(),
            ipfs_api_url,
            ipfs_pin: env::get_parsed(EnvKey::IpfsPin, true),
            ipfs_cid_version: env::get_parsed(EnvKey::IpfsCidVersion, 1),
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, DEFAULT_MAX_UPLOAD_BYTES),
        })
    }

    /// Directory that holds uploaded source files until their job finishes.
    pub fn scratch_dir(&self) -> PathBuf {
        self.temp_video_dir.join("scratch")
    }

    /// Output directory for one job's HLS renditions.
    pub fn job_output_dir(&self, job_id: &uuid::Uuid) -> PathBuf {
        self.temp_video_dir.join(job_id.to_string())
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests(temp_video_dir: &std::path::Path) -> Self {
        Self {
            server_port: 0,
            temp_video_dir: temp_video_dir.to_path_buf(),
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
            ipfs_api_url: Url::parse("http://127.0.0.1:5001").expect("static url"),
            ipfs_pin: true,
            ipfs_cid_version: 1,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
