//! Parser for ffmpeg's `-progress` output.
//!
//! ffmpeg writes blocks of `key=value` lines, each block terminated by
//! `progress=continue` (or `progress=end` for the last one). Reads arrive in
//! fixed-size chunks, so a line may be split across chunks and a chunk may
//! carry several blocks.

use std::num::NonZeroU64;

/// Size of the buffer the pipeline reads ffmpeg's stdout with.
pub const READ_BUFFER_SIZE: usize = 1 << 10;

/// Highest percentage reported while ffmpeg is still running.
pub const MAX_RUNNING_PERCENTAGE: u8 = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Cumulative number of frames encoded so far.
    Frames(u64),
    /// A block, or the stream tail, had no usable frame counter.
    Malformed(String),
    /// ffmpeg reported `progress=end`.
    End,
}

#[derive(Debug, Default)]
pub struct ProgressParser {
    pending: Vec<u8>,
    frame: Option<Result<u64, String>>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of raw stdout. Returns the events completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ProgressEvent> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.handle_line(&line, &mut events);
        }
        events
    }

    /// Flush an unterminated last line once the stream has closed. A frame
    /// value still waiting for its `progress=` line is reported as well.
    pub fn finish(&mut self) -> Vec<ProgressEvent> {
        let line = std::mem::take(&mut self.pending);
        let mut events = Vec::new();
        self.handle_line(&line, &mut events);

        match self.frame.take() {
            Some(Ok(frames)) => events.push(ProgressEvent::Frames(frames)),
            Some(Err(reason)) => events.push(ProgressEvent::Malformed(reason)),
            None => {}
        }
        events
    }

    fn handle_line(&mut self, raw: &[u8], events: &mut Vec<ProgressEvent>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if line.is_empty() {
            return;
        }

        let Some((key, value)) = line.split_once('=') else {
            self.frame = Some(Err(format!("unexpected progress line {line:?}")));
            return;
        };

        match key.trim() {
            "frame" => {
                let value = value.trim();
                self.frame = Some(
                    value
                        .parse::<u64>()
                        .map_err(|e| format!("invalid frame count {value:?}: {e}")),
                );
            }
            "progress" => {
                match self.frame.take() {
                    Some(Ok(frames)) => events.push(ProgressEvent::Frames(frames)),
                    Some(Err(reason)) => events.push(ProgressEvent::Malformed(reason)),
                    None => events.push(ProgressEvent::Malformed(
                        "progress block without frame count".to_string(),
                    )),
                }
                if value.trim() == "end" {
                    events.push(ProgressEvent::End);
                }
            }
            _ => {}
        }
    }
}

/// `floor(frames * 100 / total_frames)`, clamped to the running range.
pub fn percentage(frames: u64, total_frames: NonZeroU64) -> u8 {
    let pct = u128::from(frames) * 100 / u128::from(total_frames.get());
    pct.min(u128::from(MAX_RUNNING_PERCENTAGE)) as u8
}

/// Tracks whether the stream ended on a failed parse.
#[derive(Debug, Default)]
pub struct ParseHealth {
    last_failure: Option<String>,
    saw_output: bool,
    saw_frames: bool,
}

impl ParseHealth {
    /// Records that the stream produced bytes.
    pub fn note_output(&mut self) {
        self.saw_output = true;
    }

    pub fn observe(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Frames(_) => {
                self.saw_frames = true;
                self.last_failure = None;
            }
            ProgressEvent::Malformed(reason) => self.last_failure = Some(reason.clone()),
            ProgressEvent::End => {}
        }
    }

    /// The failure that was never followed by a good update, if any. Output
    /// that never yielded a frame count counts as one.
    pub fn into_persistent_failure(self) -> Option<String> {
        self.last_failure.or_else(|| {
            (self.saw_output && !self.saw_frames)
                .then(|| "no frame count in progress output".to_string())
        })
    }
}
