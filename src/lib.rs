// src/lib.rs
pub mod config;
pub mod core;
pub mod discovery;
pub mod monitoring;
pub mod recorder;
pub mod testing;
pub mod types;

// Re-export the most used types
pub use core::{ComponentLogger, EventSink, LogContext, LogSink, Severity};
pub use recorder::{
    FfmpegTranscoder, RecordingSettings, RetentionRing, SegmentScheduler, SegmentTiming,
    Supervisor, Transcoder, TranscoderCommand,
};
pub use types::{CameraDescriptor, CameraOutcome, SupervisorReport};
