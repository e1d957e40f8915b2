use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use axum::extract::multipart::Field;
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

/// Scratch path for an upload: `<dir>/<id><suffix>.<ext>`, with the
/// extension taken from the client's file name when it has one.
pub fn scratch_path(dir: &Path, id: Uuid, suffix: &str, file_name: Option<&str>) -> PathBuf {
    let extension = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty());

    match extension {
        Some(ext) => dir.join(format!("{}{}.{}", id, suffix, ext)),
        None => dir.join(format!("{}{}", id, suffix)),
    }
}

/// Streams a multipart field to `dest` chunk by chunk. A partially written
/// file is removed when the stream or the disk fails.
pub async fn stream_to_file(mut field: Field<'_>, dest: &Path) -> Result<u64> {
    let mut file = File::create(dest)
        .await
        .with_context(|| format!("failed to create {}", dest.display()))?;

    let mut written: u64 = 0;
    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                error!("Stream error: {}", e);
                discard(dest).await;
                return Err(anyhow!("Stream interrupted: {}", e));
            }
        };

        if let Err(e) = file.write_all(&chunk).await {
            error!("Write error on {}: {}", dest.display(), e);
            discard(dest).await;
            return Err(e.into());
        }
        written += chunk.len() as u64;
    }

    if let Err(e) = file.flush().await {
        discard(dest).await;
        return Err(e.into());
    }

    info!("📦 Stored upload at {} ({} bytes)", dest.display(), written);
    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            error!("Failed to remove partial upload {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_path_keeps_client_extension() {
        let id = Uuid::nil();
        let path = scratch_path(Path::new("/tmp/s"), id, "", Some("holiday.MOV"));
        assert_eq!(
            path,
            PathBuf::from("/tmp/s/00000000-0000-0000-0000-000000000000.MOV")
        );
    }

    #[test]
    fn scratch_path_with_suffix_and_no_extension() {
        let id = Uuid::nil();
        let path = scratch_path(Path::new("/tmp/s"), id, "-thumbnail", Some("cover"));
        assert_eq!(
            path,
            PathBuf::from("/tmp/s/00000000-0000-0000-0000-000000000000-thumbnail")
        );

        let path = scratch_path(Path::new("/tmp/s"), id, "-thumbnail", None);
        assert_eq!(
            path,
            PathBuf::from("/tmp/s/00000000-0000-0000-0000-000000000000-thumbnail")
        );
    }
}
