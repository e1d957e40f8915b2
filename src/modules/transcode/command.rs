//! ffmpeg argument vector for an HLS adaptive-bitrate encode.

use std::path::Path;

use super::ladder::Rendition;

/// HLS segment length in seconds.
pub const HLS_SEGMENT_SECONDS: u32 = 2;
/// GOP size in frames, fixed regardless of the source frame rate.
pub const KEYFRAME_INTERVAL: u32 = 48;

pub const MASTER_PLAYLIST: &str = "master.m3u8";
const VARIANT_PLAYLIST: &str = "stream_%v.m3u8";
const SEGMENT_PATTERN: &str = "stream_%v-data%02d.ts";

const VIDEO_CODEC: &str = "libx264";
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "96k";

/// Builds the full ffmpeg argument list that encodes `source` into one HLS
/// variant per rendition under `dest_dir`. Progress is written as key=value
/// blocks to stdout.
///
/// Deterministic: the same inputs always produce the same arguments.
///
/// # Panics
/// If `ladder` is empty.
pub fn build_encode_args(source: &Path, dest_dir: &Path, ladder: &[Rendition]) -> Vec<String> {
    assert!(!ladder.is_empty(), "encode ladder must contain at least one rendition");

    let mut args = vec![
        "-i".to_string(),
        path_arg(source),
        "-loglevel".to_string(),
        "error".to_string(),
        "-progress".to_string(),
        "-".to_string(),
        "-nostats".to_string(),
        "-y".to_string(),
    ];

    args.extend(filter_args(ladder));
    args.extend(video_stream_args(ladder));
    args.extend(audio_stream_args(ladder.len()));
    args.extend(hls_args(dest_dir));
    args.extend(var_stream_map_args(ladder));
    args.push(path_arg(&dest_dir.join(VARIANT_PLAYLIST)));

    args
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Split the source video once per rendition and scale each branch.
fn filter_args(ladder: &[Rendition]) -> Vec<String> {
    let split_outputs: String = (1..=ladder.len()).map(|i| format!("[v{i}]")).collect();
    let split = format!("[0:v]split={}{}", ladder.len(), split_outputs);

    let scales = ladder.iter().enumerate().map(|(i, r)| {
        format!(
            "[v{n}]scale=w={w}:h={h}:force_original_aspect_ratio=increase:force_divisible_by=2[v{n}out]",
            n = i + 1,
            w = r.width,
            h = r.height,
        )
    });

    let graph = std::iter::once(split)
        .chain(scales)
        .collect::<Vec<_>>()
        .join("; ");

    vec!["-filter_complex".to_string(), graph]
}

fn video_stream_args(ladder: &[Rendition]) -> Vec<String> {
    let keyint = KEYFRAME_INTERVAL.to_string();
    let mut args = Vec::with_capacity(ladder.len() * 24);

    for (i, r) in ladder.iter().enumerate() {
        args.extend([
            "-map".to_string(),
            format!("[v{}out]", i + 1),
            format!("-c:v:{i}"),
            VIDEO_CODEC.to_string(),
            format!("-b:v:{i}"),
            r.bitrate.to_string(),
            format!("-maxrate:v:{i}"),
            r.max_rate.to_string(),
            format!("-minrate:v:{i}"),
            r.min_rate.to_string(),
            format!("-bufsize:v:{i}"),
            r.buffer_size.to_string(),
            "-preset".to_string(),
            "fast".to_string(),
            "-crf".to_string(),
            "20".to_string(),
            "-g".to_string(),
            keyint.clone(),
            "-sc_threshold".to_string(),
            "0".to_string(),
            "-keyint_min".to_string(),
            keyint.clone(),
        ]);
    }

    args
}

/// Every variant carries its own copy of the first source audio track.
fn audio_stream_args(count: usize) -> Vec<String> {
    (0..count)
        .flat_map(|i| {
            [
                "-map".to_string(),
                "a:0".to_string(),
                format!("-c:a:{i}"),
                AUDIO_CODEC.to_string(),
                format!("-b:a:{i}"),
                AUDIO_BITRATE.to_string(),
                "-ac".to_string(),
                "2".to_string(),
            ]
        })
        .collect()
}

fn hls_args(dest_dir: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        HLS_SEGMENT_SECONDS.to_string(),
        "-hls_playlist_type".to_string(),
        "vod".to_string(),
        "-hls_flags".to_string(),
        "independent_segments".to_string(),
        "-hls_segment_type".to_string(),
        "mpegts".to_string(),
        "-hls_segment_filename".to_string(),
        path_arg(&dest_dir.join(SEGMENT_PATTERN)),
        "-master_pl_name".to_string(),
        MASTER_PLAYLIST.to_string(),
    ]
}

fn var_stream_map_args(ladder: &[Rendition]) -> Vec<String> {
    let map = ladder
        .iter()
        .enumerate()
        .map(|(i, r)| format!("v:{i},a:{i},name:{}", r.label))
        .collect::<Vec<_>>()
        .join(" ");

    vec!["-var_stream_map".to_string(), map]
}
