use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    TempVideoDir,
    FfmpegPath,
    FfprobePath,
    IpfsApiUrl,
    IpfsPin,
    IpfsCidVersion,
    MaxUploadBytes,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::TempVideoDir => "TEMP_VIDEO_DIR",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::IpfsApiUrl => "IPFS_API_URL",
            EnvKey::IpfsPin => "IPFS_PIN",
            EnvKey::IpfsCidVersion => "IPFS_CID_VERSION",
            EnvKey::MaxUploadBytes => "MAX_UPLOAD_BYTES",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
