use std::num::NonZeroU64;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::modules::transcode::command::build_encode_args;
use crate::modules::transcode::error::TranscodeError;
use crate::modules::transcode::events::TranscodeJob;
use crate::modules::transcode::ladder::plan_ladder;
use crate::modules::transcode::progress::{
    percentage, ParseHealth, ProgressEvent, ProgressParser, READ_BUFFER_SIZE,
};
use crate::modules::transcode::registry::JobRegistry;
use crate::state::AppState;

/// Result of a successful pipeline run.
#[derive(Debug)]
struct Transcoded {
    cid: String,
    length: u64,
}

/// Runs the job on its own task. The job must already be registered.
pub fn spawn_job(state: AppState, job: TranscodeJob) -> JoinHandle<()> {
    tokio::spawn(run_job(state, job))
}

/// Probe, encode, ingest, clean up and record the terminal state.
pub async fn run_job(state: AppState, job: TranscodeJob) {
    info!("🎥 Starting transcode job {} for {}", job.job_id, job.source.display());

    let output_dir = state.config.job_output_dir(&job.job_id);
    let result = process_job(&state, &job, &output_dir).await;

    remove_scratch(&job.source, &output_dir).await;

    let recorded = match result {
        Ok(Transcoded { cid, length }) => {
            info!("✅ Job {} finished: {} ({}s)", job.job_id, cid, length);
            state.jobs.complete(job.job_id, cid, length).await
        }
        Err(e) => {
            error!(kind = e.kind(), "❌ Job {} failed: {}", job.job_id, e);
            state.jobs.fail(job.job_id, e).await
        }
    };

    if let Err(e) = recorded {
        warn!("Could not record outcome of job {}: {}", job.job_id, e);
    }
}

async fn process_job(
    state: &AppState,
    job: &TranscodeJob,
    output_dir: &Path,
) -> Result<Transcoded, TranscodeError> {
    let probe = state.probe.as_ref();

    let duration = probe
        .duration(&job.source)
        .await
        .map_err(|e| TranscodeError::probe(format!("duration: {e}")))?;
    let length = duration.ceil() as u64;

    let fps = probe
        .frame_rate(&job.source)
        .await
        .map_err(|e| TranscodeError::probe(format!("frame rate: {e}")))?;

    let total_frames = total_frames(length, fps)
        .ok_or_else(|| TranscodeError::probe(format!("no frames in {length}s at {fps} fps")))?;

    let resolution = probe
        .resolution(&job.source)
        .await
        .map_err(|e| TranscodeError::probe(format!("resolution: {e}")))?;

    // The denominator is fixed before ffmpeg can report any progress.
    state
        .jobs
        .start_encoding(job.job_id, total_frames)
        .await
        .map_err(|e| TranscodeError::encode(e.to_string()))?;

    let ladder = plan_ladder(resolution.height);
    info!(
        "Job {}: {}x{}, {}s, {} frames, {} renditions",
        job.job_id,
        resolution.width,
        resolution.height,
        length,
        total_frames,
        ladder.len()
    );

    tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
        TranscodeError::encode(format!("cannot create {}: {e}", output_dir.display()))
    })?;

    let args = build_encode_args(&job.source, output_dir, &ladder);
    run_encoder(state, job.job_id, total_frames, &args).await?;

    info!("📦 Adding {} to content store", output_dir.display());
    let cid = state
        .storage
        .add_directory(output_dir)
        .await
        .map_err(|e| TranscodeError::ingest(e.to_string()))?;

    Ok(Transcoded { cid, length })
}

fn total_frames(length: u64, fps: f64) -> Option<NonZeroU64> {
    NonZeroU64::new((length as f64 * fps).ceil() as u64)
}

async fn run_encoder(
    state: &AppState,
    job_id: Uuid,
    total_frames: NonZeroU64,
    args: &[String],
) -> Result<(), TranscodeError> {
    let program = &state.config.ffmpeg_path;
    debug!("{} {}", program.display(), args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TranscodeError::encode(format!("failed to start ffmpeg: {e}")))?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(TranscodeError::encode("ffmpeg output not captured"));
    };

    // Both pipes are drained concurrently so ffmpeg never blocks on a full one.
    let progress = tokio::spawn(track_progress(stdout, state.jobs.clone(), job_id, total_frames));
    let diagnostics = tokio::spawn(log_stderr(stderr, job_id));

    let status = child
        .wait()
        .await
        .map_err(|e| TranscodeError::encode(format!("failed waiting for ffmpeg: {e}")))?;

    let parse_failure = progress
        .await
        .map_err(|e| TranscodeError::encode(format!("progress reader stopped: {e}")))?;
    let last_diagnostic = diagnostics.await.ok().flatten();

    if !status.success() {
        let detail = last_diagnostic.map(|d| format!(": {d}")).unwrap_or_default();
        return Err(TranscodeError::encode(format!("ffmpeg exited with {status}{detail}")));
    }

    if let Some(reason) = parse_failure {
        return Err(TranscodeError::encode(format!("unreadable progress: {reason}")));
    }

    Ok(())
}

/// Feeds ffmpeg's stdout through the progress parser into the registry.
/// Returns the parse failure that was still unresolved when the stream closed.
async fn track_progress<R>(
    mut stdout: R,
    jobs: JobRegistry,
    job_id: Uuid,
    total_frames: NonZeroU64,
) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut parser = ProgressParser::new();
    let mut health = ParseHealth::default();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        let (events, closed) = match stdout.read(&mut buf).await {
            Ok(0) => (parser.finish(), true),
            Ok(n) => {
                health.note_output();
                (parser.feed(&buf[..n]), false)
            }
            Err(e) => {
                error!("Error reading progress of job {}: {}", job_id, e);
                let mut events = parser.finish();
                events.push(ProgressEvent::Malformed(format!("read error: {e}")));
                (events, true)
            }
        };

        for event in &events {
            health.observe(event);
            match event {
                ProgressEvent::Frames(frames) => {
                    let pct = percentage(*frames, total_frames);
                    if let Err(e) = jobs.record_progress(job_id, pct).await {
                        warn!("Dropping progress for job {}: {}", job_id, e);
                    }
                }
                ProgressEvent::Malformed(reason) => {
                    warn!("Error updating progress of job {}: {}", job_id, reason);
                }
                ProgressEvent::End => debug!("ffmpeg reported end of job {}", job_id),
            }
        }

        if closed {
            break;
        }
    }

    health.into_persistent_failure()
}

/// Logs ffmpeg's diagnostics and returns the last non-empty line.
async fn log_stderr(stderr: ChildStderr, job_id: Uuid) -> Option<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut last = None;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                error!(ffmpeg = "stderr", job = %job_id, "{}", line);
                last = Some(line);
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Stopped reading ffmpeg stderr for job {}: {}", job_id, e);
                break;
            }
        }
    }

    last
}

async fn remove_scratch(source: &Path, output_dir: &Path) {
    if let Err(e) = tokio::fs::remove_file(source).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed removing scratch file {}: {}", source.display(), e);
        }
    }

    if let Err(e) = tokio::fs::remove_dir_all(output_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed removing output folder {}: {}", output_dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AppConfig;
    use crate::infrastructure::storage::content_store::{ContentStore, StoreError};
    use crate::modules::transcode::model::{JobPhase, JobStatus};
    use crate::modules::transcode::probe::{MediaProbe, ProbeError, Resolution};
    use async_trait::async_trait;
    use serial_test::serial;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    struct FakeProbe {
        duration: Option<f64>,
        fps: f64,
        resolution: Resolution,
    }

    impl FakeProbe {
        fn video(duration: f64, width: u32, height: u32) -> Self {
            Self {
                duration: Some(duration),
                fps: 30.0,
                resolution: Resolution { width, height },
            }
        }

        fn corrupt() -> Self {
            Self {
                duration: None,
                ..Self::video(0.0, 0, 0)
            }
        }
    }

    #[async_trait]
    impl MediaProbe for FakeProbe {
        async fn duration(&self, _path: &Path) -> Result<f64, ProbeError> {
            self.duration.ok_or(ProbeError::Unparseable {
                field: "duration",
                output: "N/A".into(),
            })
        }

        async fn frame_rate(&self, _path: &Path) -> Result<f64, ProbeError> {
            Ok(self.fps)
        }

        async fn resolution(&self, _path: &Path) -> Result<Resolution, ProbeError> {
            Ok(self.resolution)
        }
    }

    #[derive(Default)]
    struct FakeStore {
        fail: bool,
        added: Mutex<Vec<PathBuf>>,
        encode_args: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ContentStore for FakeStore {
        async fn add_directory(&self, path: &Path) -> Result<String, StoreError> {
            self.added.lock().unwrap().push(path.to_path_buf());
            *self.encode_args.lock().unwrap() = std::fs::read_to_string(path.join("args.txt")).ok();
            if self.fail {
                return Err(StoreError::Api {
                    status: 500,
                    body: "node offline".into(),
                });
            }
            Ok("bafyvideo".into())
        }

        async fn add_file(&self, _path: &Path) -> Result<String, StoreError> {
            Ok("bafyfile".into())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        state: AppState,
        store: Arc<FakeStore>,
        job: TranscodeJob,
    }

    async fn fixture(probe: FakeProbe, store: FakeStore, ffmpeg_script: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_tests(dir.path());
        config.ffmpeg_path = match ffmpeg_script {
            Some(body) => write_script(dir.path(), body),
            None => dir.path().join("ffmpeg-was-never-installed"),
        };

        std::fs::create_dir_all(config.scratch_dir()).unwrap();
        let source = config.scratch_dir().join("upload.mp4");
        std::fs::write(&source, b"fake video").unwrap();

        let store = Arc::new(store);
        let state = AppState::new(config, store.clone(), Arc::new(probe));
        let job = TranscodeJob {
            job_id: Uuid::new_v4(),
            source,
        };
        state.jobs.register(job.job_id).await.unwrap();

        Fixture { dir, state, store, job }
    }

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-ffmpeg.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    // Records its arguments next to the HLS output, then reports progress.
    const ENCODE_OK: &str = r#"for last; do :; done
printf '%s\n' "$@" > "$(dirname "$last")/args.txt"
printf 'frame=450\nfps=30.0\nprogress=continue\n'
printf 'frame=900\nfps=30.0\nprogress=end\n'
exit 0"#;

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn full_hd_source_completes_with_cid_and_length() {
        let f = fixture(FakeProbe::video(29.5, 1920, 1080), FakeStore::default(), Some(ENCODE_OK)).await;
        let output_dir = f.state.config.job_output_dir(&f.job.job_id);

        run_job(f.state.clone(), f.job.clone()).await;

        assert_eq!(
            f.state.jobs.take_status(f.job.job_id).await,
            JobStatus::Done {
                cid: "bafyvideo".into(),
                length: 30
            }
        );
        assert_eq!(*f.store.added.lock().unwrap(), vec![output_dir.clone()]);

        let args = f.store.encode_args.lock().unwrap().clone().unwrap();
        assert_eq!(args.lines().filter(|l| *l == "a:0").count(), 5);
        assert!(args.contains("name:1080p"));

        assert!(!f.job.source.exists());
        assert!(!output_dir.exists());
        assert!(f.dir.path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn small_source_encodes_a_single_rendition() {
        let f = fixture(FakeProbe::video(3.0, 200, 100), FakeStore::default(), Some(ENCODE_OK)).await;

        run_job(f.state.clone(), f.job.clone()).await;

        let args = f.store.encode_args.lock().unwrap().clone().unwrap();
        assert_eq!(args.lines().filter(|l| *l == "a:0").count(), 1);
        assert!(args.contains("v:0,a:0,name:240p"));
        assert!(matches!(
            f.state.jobs.take_status(f.job.job_id).await,
            JobStatus::Done { length: 3, .. }
        ));
    }

    #[tokio::test]
    async fn probe_failure_never_spawns_encoder() {
        let f = fixture(FakeProbe::corrupt(), FakeStore::default(), None).await;

        run_job(f.state.clone(), f.job.clone()).await;

        match f.state.jobs.take_status(f.job.job_id).await {
            JobStatus::Failed { error } => assert_eq!(error.kind(), "probe_failure"),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(f.store.added.lock().unwrap().is_empty());
        assert!(!f.job.source.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn encoder_exit_failure_still_removes_scratch() {
        let script = "printf 'frame=100\\nprogress=continue\\n'\necho 'Conversion failed!' >&2\nexit 1";
        let f = fixture(FakeProbe::video(30.0, 1280, 720), FakeStore::default(), Some(script)).await;

        run_job(f.state.clone(), f.job.clone()).await;

        match f.state.jobs.take_status(f.job.job_id).await {
            JobStatus::Failed {
                error: TranscodeError::Encode(message),
            } => assert!(message.contains("Conversion failed!"), "{message}"),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(f.store.added.lock().unwrap().is_empty());
        assert!(!f.job.source.exists());
        assert!(!f.state.config.job_output_dir(&f.job.job_id).exists());
        assert_eq!(f.state.jobs.take_status(f.job.job_id).await, JobStatus::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn progress_unreadable_until_close_fails_the_encode() {
        let script = "printf 'frame=oops\\nprogress=end\\n'\nexit 0";
        let f = fixture(FakeProbe::video(10.0, 640, 360), FakeStore::default(), Some(script)).await;

        run_job(f.state.clone(), f.job.clone()).await;

        match f.state.jobs.take_status(f.job.job_id).await {
            JobStatus::Failed {
                error: TranscodeError::Encode(message),
            } => assert!(message.contains("unreadable progress")),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(f.store.added.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn progress_without_block_terminator_fails_the_encode() {
        let script = "printf 'frame=oops\\nthis is not progress\\n'\nexit 0";
        let f = fixture(FakeProbe::video(10.0, 640, 360), FakeStore::default(), Some(script)).await;

        run_job(f.state.clone(), f.job.clone()).await;

        match f.state.jobs.take_status(f.job.job_id).await {
            JobStatus::Failed {
                error: TranscodeError::Encode(message),
            } => assert!(message.contains("unreadable progress")),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(f.store.added.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn store_failure_is_an_ingest_failure() {
        let store = FakeStore {
            fail: true,
            ..FakeStore::default()
        };
        let f = fixture(FakeProbe::video(5.0, 854, 480), store, Some(ENCODE_OK)).await;

        run_job(f.state.clone(), f.job.clone()).await;

        match f.state.jobs.take_status(f.job.job_id).await {
            JobStatus::Failed { error } => {
                assert_eq!(error.kind(), "ingest_failure");
                assert!(error.to_string().contains("node offline"));
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert!(!f.job.source.exists());
        assert!(!f.state.config.job_output_dir(&f.job.job_id).exists());
    }

    #[tokio::test]
    async fn progress_stream_updates_registry_monotonically() {
        let jobs = JobRegistry::new();
        let id = Uuid::new_v4();
        jobs.register(id).await.unwrap();
        let total = NonZeroU64::new(200).unwrap();
        jobs.start_encoding(id, total).await.unwrap();

        let stream: &[u8] =
            b"frame=150\nprogress=continue\nframe=garbage\nprogress=continue\nframe=100\nprogress=continue\n\0\0\0";
        let failure = track_progress(stream, jobs.clone(), id, total).await;

        assert_eq!(failure, None);
        assert_eq!(
            jobs.phase(id).await,
            Some(JobPhase::Encoding {
                total_frames: total,
                progress: 75
            })
        );
    }

    #[tokio::test]
    async fn trailing_malformed_progress_is_reported() {
        let jobs = JobRegistry::new();
        let id = Uuid::new_v4();
        jobs.register(id).await.unwrap();
        let total = NonZeroU64::new(10).unwrap();
        jobs.start_encoding(id, total).await.unwrap();

        let stream: &[u8] = b"frame=5\nprogress=continue\nframe=\nprogress=end\n";
        let failure = track_progress(stream, jobs.clone(), id, total).await;

        assert!(failure.is_some());
        assert_eq!(jobs.take_status(id).await, JobStatus::InProgress { percentage: 50 });
    }

    #[tokio::test]
    async fn unterminated_bad_frame_at_close_is_reported() {
        let jobs = JobRegistry::new();
        let id = Uuid::new_v4();
        jobs.register(id).await.unwrap();
        let total = NonZeroU64::new(10).unwrap();
        jobs.start_encoding(id, total).await.unwrap();

        let stream: &[u8] = b"frame=oops\nfps=abc\n";
        let failure = track_progress(stream, jobs.clone(), id, total).await;

        assert!(failure.is_some());
        assert_eq!(jobs.take_status(id).await, JobStatus::InProgress { percentage: 0 });
    }

    #[test]
    fn total_frames_rounds_up_and_rejects_zero() {
        assert_eq!(total_frames(30, 30.0).map(NonZeroU64::get), Some(900));
        assert_eq!(total_frames(10, 29.97).map(NonZeroU64::get), Some(300));
        assert_eq!(total_frames(0, 30.0), None);
    }
}
