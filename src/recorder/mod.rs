// src/recorder/mod.rs

use std::path::{Path, PathBuf};

use crate::core::error::RecorderResult;

/// One running transcoder invocation.
pub trait SessionHandle: Send + Sync {
    /// Native process id (or a synthetic id for mocks).
    fn id(&self) -> u32;

    /// Graceful stop request. Does not wait; already-exited is not an error.
    fn terminate(&mut self) -> RecorderResult<()>;

    fn has_exited(&self) -> bool;
}

/// Launches transcoder sessions without waiting for them.
pub trait Transcoder: Send + Sync {
    fn start(&self, command: &TranscoderCommand) -> RecorderResult<Box<dyn SessionHandle>>;
}

/// Argument vector for one session. Never passed through a shell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscoderCommand {
    pub program: String,
    pub stream_url: String,
    pub output: PathBuf,
    pub args: Vec<String>,
}

impl TranscoderCommand {
    /// Flag layout is a compatibility contract with ffmpeg; keep in sync with
    /// the deployed binary.
    pub fn ffmpeg(program: &str, stream_url: &str, output: &Path) -> Self {
        let args = vec![
            "-loglevel".to_string(),
            "quiet".to_string(),
            "-i".to_string(),
            stream_url.to_string(),
            "-bsf:a".to_string(),
            "aac_adtstoasc".to_string(),
            "-vcodec".to_string(),
            "copy".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-crf".to_string(),
            "50".to_string(),
            output.to_string_lossy().into_owned(),
        ];

        Self {
            program: program.to_string(),
            stream_url: stream_url.to_string(),
            output: output.to_path_buf(),
            args,
        }
    }
}

pub mod process;
pub mod retention;
pub mod scheduler;
pub mod supervisor;

pub use process::FfmpegTranscoder;
pub use retention::RetentionRing;
pub use scheduler::{RecordingSettings, SchedulerState, SegmentScheduler, SegmentTiming};
pub use supervisor::Supervisor;
