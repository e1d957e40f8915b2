//! Source media inspection through `ffprobe`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run ffprobe: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffprobe exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("unexpected ffprobe output for {field}: {output:?}")]
    Unparseable { field: &'static str, output: String },
}

/// Width and height of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Container duration in seconds.
    async fn duration(&self, path: &Path) -> Result<f64, ProbeError>;

    /// Frames per second of the first video stream.
    async fn frame_rate(&self, path: &Path) -> Result<f64, ProbeError>;

    async fn resolution(&self, path: &Path) -> Result<Resolution, ProbeError>;
}

pub struct FfprobeProbe {
    program: PathBuf,
}

impl FfprobeProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, path: &Path, args: &[&str]) -> Result<String, ProbeError> {
        debug!("Running {} on {}", self.program.display(), path.display());

        let output = Command::new(&self.program)
            .arg("-i")
            .arg(path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let out = self
            .run(path, &["-show_entries", "format=duration", "-v", "quiet", "-of", "csv=p=0"])
            .await?;
        parse_duration(&out)
    }

    async fn frame_rate(&self, path: &Path) -> Result<f64, ProbeError> {
        let out = self
            .run(
                path,
                &[
                    "-show_entries",
                    "stream=r_frame_rate",
                    "-v",
                    "error",
                    "-of",
                    "default=nokey=1:noprint_wrappers=1",
                    "-select_streams",
                    "v:0",
                ],
            )
            .await?;
        parse_frame_rate(&out)
    }

    async fn resolution(&self, path: &Path) -> Result<Resolution, ProbeError> {
        let out = self
            .run(
                path,
                &[
                    "-show_entries",
                    "stream=width,height",
                    "-v",
                    "quiet",
                    "-of",
                    "csv=s=x:p=0",
                    "-select_streams",
                    "v:0",
                ],
            )
            .await?;
        parse_resolution(&out)
    }
}

fn first_line(output: &str) -> &str {
    output.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

pub(crate) fn parse_duration(output: &str) -> Result<f64, ProbeError> {
    let line = first_line(output);
    line.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| ProbeError::Unparseable {
            field: "duration",
            output: output.to_string(),
        })
}

/// Accepts both rational (`30000/1001`) and decimal (`29.97`) forms.
pub(crate) fn parse_frame_rate(output: &str) -> Result<f64, ProbeError> {
    let line = first_line(output);
    let fps = match line.split_once('/') {
        Some((num, den)) => match (num.parse::<f64>(), den.parse::<f64>()) {
            (Ok(num), Ok(den)) if den > 0.0 => Some(num / den),
            _ => None,
        },
        None => line.parse::<f64>().ok(),
    };

    fps.filter(|f| f.is_finite() && *f > 0.0)
        .ok_or_else(|| ProbeError::Unparseable {
            field: "frame rate",
            output: output.to_string(),
        })
}

pub(crate) fn parse_resolution(output: &str) -> Result<Resolution, ProbeError> {
    let line = first_line(output);
    let parsed = line.split_once('x').and_then(|(w, h)| {
        Some(Resolution {
            width: w.trim().parse().ok()?,
            height: h.trim().trim_end_matches('x').parse().ok()?,
        })
    });

    parsed
        .filter(|r| r.width > 0 && r.height > 0)
        .ok_or_else(|| ProbeError::Unparseable {
            field: "resolution",
            output: output.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_parses_ffprobe_csv() {
        assert!((parse_duration("29.533333\n").unwrap() - 29.533333).abs() < 1e-9);
        assert!(parse_duration("N/A\n").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn frame_rate_handles_rational_and_decimal() {
        assert!((parse_frame_rate("30/1\n").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001\n").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("25").unwrap() - 25.0).abs() < 0.01);
        assert!(parse_frame_rate("0/0\n").is_err());
    }

    #[test]
    fn resolution_parses_width_by_height() {
        assert_eq!(
            parse_resolution("1920x1080\n").unwrap(),
            Resolution { width: 1920, height: 1080 }
        );
        assert_eq!(parse_resolution("200x100x\n").unwrap().height, 100);
        assert!(parse_resolution("garbage").is_err());
    }

    #[tokio::test]
    async fn missing_ffprobe_binary_is_a_probe_error() {
        let probe = FfprobeProbe::new("/nonexistent/ffprobe");
        let err = probe.duration(Path::new("in.mp4")).await.unwrap_err();
        assert!(matches!(err, ProbeError::Io(_)));
    }
}
