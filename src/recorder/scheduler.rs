// src/recorder/scheduler.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::{RetentionRing, SessionHandle, Transcoder, TranscoderCommand};
use crate::core::error::{ConfigError, RecorderError, RecorderResult};
use crate::core::logging::{ComponentLogger, EventSink, LogContext, Severity};
use crate::core::timestamp::file_stamp;
use crate::monitoring::CameraStats;
use crate::types::CameraDescriptor;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Segment length and how long consecutive segments overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentTiming {
    segment: Duration,
    overlap: Duration,
}

impl SegmentTiming {
    /// Requires `0 < 2 * overlap < segment`.
    pub fn new(segment: Duration, overlap: Duration) -> Result<Self, ConfigError> {
        if overlap.is_zero() {
            return Err(ConfigError::message("overlap must be greater than zero"));
        }
        if overlap * 2 >= segment {
            return Err(ConfigError::message(format!(
                "overlap ({}s) must be less than half the segment length ({}s)",
                overlap.as_secs_f64(),
                segment.as_secs_f64()
            )));
        }
        Ok(Self { segment, overlap })
    }

    pub fn segment(&self) -> Duration {
        self.segment
    }

    pub fn overlap(&self) -> Duration {
        self.overlap
    }

    /// Wait after the very first session before the first overlap begins.
    pub fn bootstrap_wait(&self) -> Duration {
        self.segment.saturating_sub(self.overlap)
    }

    /// Time only the newest session is recording, between two overlaps.
    pub fn solo_wait(&self) -> Duration {
        self.segment.saturating_sub(self.overlap * 2)
    }
}

#[derive(Debug, Clone)]
pub struct RecordingSettings {
    pub timing: SegmentTiming,
    /// 0 = keep every file.
    pub retention_count: usize,
    pub program: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Recording,
    Overlapping,
    Stopped,
}

struct Session {
    handle: Box<dyn SessionHandle>,
    path: PathBuf,
    index: u64,
    started_at: DateTime<Utc>,
}

/// Drives one camera: start, overlap, stop previous, repeat.
pub struct SegmentScheduler {
    camera: Arc<CameraDescriptor>,
    settings: RecordingSettings,
    transcoder: Arc<dyn Transcoder>,
    sink: Arc<dyn EventSink>,
    stats: Arc<CameraStats>,
    ring: RetentionRing,
    session_counter: u64,
    current: Option<Session>,
    previous: Option<Session>,
    draining: Vec<Session>,
    // evicted while their session was still writing
    deferred_deletes: Vec<PathBuf>,
    // highest stamp handed out so far
    last_stamp: Option<String>,
    state: SchedulerState,
    clock: fn() -> DateTime<Utc>,
}

impl ComponentLogger for SegmentScheduler {
    fn log_context(&self) -> LogContext {
        LogContext::new("scheduler", &self.camera.serial)
    }
}

impl SegmentScheduler {
    pub fn new(
        camera: Arc<CameraDescriptor>,
        settings: RecordingSettings,
        transcoder: Arc<dyn Transcoder>,
        sink: Arc<dyn EventSink>,
        stats: Arc<CameraStats>,
    ) -> Self {
        let ring = RetentionRing::new(settings.retention_count);
        Self {
            camera,
            settings,
            transcoder,
            sink,
            stats,
            ring,
            session_counter: 0,
            current: None,
            previous: None,
            draining: Vec::new(),
            deferred_deletes: Vec::new(),
            last_stamp: None,
            state: SchedulerState::Idle,
            clock: Utc::now,
        }
    }

    /// Replaces the wall clock used for file names.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn sessions_started(&self) -> u64 {
        self.session_counter
    }

    pub fn retention(&self) -> &RetentionRing {
        &self.ring
    }

    pub fn current_path(&self) -> Option<&PathBuf> {
        self.current.as_ref().map(|s| &s.path)
    }

    /// Runs until `cancel` fires (Ok) or a session cannot be launched (Err).
    /// Either way every live session has been asked to stop on return.
    pub async fn run(&mut self, cancel: CancellationToken) -> RecorderResult<()> {
        self.stats.running.store(true, std::sync::atomic::Ordering::Relaxed);
        let result = self.cycle(&cancel).await;

        if let Err(e) = &result {
            self.emit(
                self.sink.as_ref(),
                Severity::Fatal,
                true,
                &format!("recording stopped: {}", e),
            );
        }

        self.shutdown().await;
        self.stats.running.store(false, std::sync::atomic::Ordering::Relaxed);
        result
    }

    async fn cycle(&mut self, cancel: &CancellationToken) -> RecorderResult<()> {
        let timing = self.settings.timing;

        tokio::fs::create_dir_all(&self.camera.output_dir)
            .await
            .map_err(|e| {
                RecorderError::io(format!("creating {:?}", self.camera.output_dir), e)
            })?;

        self.emit(
            self.sink.as_ref(),
            Severity::Info,
            true,
            &format!(
                "starting recorder (segment={}s overlap={}s retention={})",
                timing.segment().as_secs(),
                timing.overlap().as_secs(),
                self.settings.retention_count
            ),
        );

        // Bootstrap: no previous session to hand over from.
        self.begin_session().await?;
        if !pause(timing.bootstrap_wait(), cancel).await {
            return Ok(());
        }

        loop {
            self.begin_session().await?;

            if !pause(timing.overlap(), cancel).await {
                return Ok(());
            }

            self.retire_previous();

            if !pause(timing.solo_wait(), cancel).await {
                return Ok(());
            }
        }
    }

    /// Plain `{stamp}.mp4` only while stamps keep moving forward and the
    /// file does not exist yet; otherwise the session index makes it unique.
    async fn next_path(&mut self, now: DateTime<Utc>, index: u64) -> PathBuf {
        let stamp = file_stamp(now);
        let advanced = self
            .last_stamp
            .as_deref()
            .is_none_or(|last| stamp.as_str() > last);

        let plain = self.camera.output_dir.join(format!("{}.mp4", stamp));
        let path = if advanced && !path_exists(&plain).await {
            plain
        } else {
            self.camera
                .output_dir
                .join(format!("{}-{}.mp4", stamp, index))
        };

        if advanced {
            self.last_stamp = Some(stamp);
        }
        path
    }

    async fn begin_session(&mut self) -> RecorderResult<()> {
        let now = (self.clock)();
        let index = self.session_counter;
        self.session_counter += 1;
        let path = self.next_path(now, index).await;

        let command = TranscoderCommand::ffmpeg(
            &self.settings.program,
            &self.camera.stream_url,
            &path,
        );

        // Launch before touching retention: a failed start must not cost a
        // finished segment.
        let handle = match self.transcoder.start(&command) {
            Ok(handle) => handle,
            Err(e) => {
                CameraStats::incr(&self.stats.launch_failures);
                return Err(e);
            }
        };
        CameraStats::incr(&self.stats.sessions_started);

        self.emit(
            self.sink.as_ref(),
            Severity::Info,
            false,
            &format!("session #{} pid={} -> {:?}", index, handle.id(), path),
        );

        let session = Session {
            handle,
            path: path.clone(),
            index,
            started_at: now,
        };

        // A session still here was never retired; stop it now rather than
        // losing track of it.
        if let Some(stale) = self.previous.take() {
            self.stop_session(stale);
        }
        self.previous = self.current.replace(session);
        self.state = if self.previous.is_some() {
            SchedulerState::Overlapping
        } else {
            SchedulerState::Recording
        };

        self.flush_deferred_deletes().await;
        if let Some(evicted) = self.ring.record(index, path) {
            if self.is_live(&evicted) {
                self.debug(&format!("{:?} still recording, deleting later", evicted));
                self.deferred_deletes.push(evicted);
            } else {
                self.delete_segment(evicted).await;
            }
        }

        self.reap_drained();
        Ok(())
    }

    fn is_live(&self, path: &Path) -> bool {
        self.current
            .iter()
            .chain(self.previous.iter())
            .any(|s| s.path == path)
    }

    async fn flush_deferred_deletes(&mut self) {
        let pending = std::mem::take(&mut self.deferred_deletes);
        for path in pending {
            if self.is_live(&path) {
                self.deferred_deletes.push(path);
            } else {
                self.delete_segment(path).await;
            }
        }
    }

    fn retire_previous(&mut self) {
        if let Some(prev) = self.previous.take() {
            self.stop_session(prev);
        }
        self.state = SchedulerState::Recording;
    }

    fn stop_session(&mut self, mut session: Session) {
        match session.handle.terminate() {
            Ok(()) => {
                CameraStats::incr(&self.stats.sessions_terminated);
                self.emit(
                    self.sink.as_ref(),
                    Severity::Debug,
                    false,
                    &format!(
                        "stopping session #{} pid={} (started {})",
                        session.index,
                        session.handle.id(),
                        session.started_at.format("%H:%M:%S")
                    ),
                );
            }
            Err(e) => {
                CameraStats::incr(&self.stats.terminate_failures);
                self.emit(self.sink.as_ref(), Severity::Error, false, &e.to_string());
            }
        }
        self.draining.push(session);
    }

    async fn delete_segment(&mut self, path: PathBuf) {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                CameraStats::incr(&self.stats.files_deleted);
                self.emit(
                    self.sink.as_ref(),
                    Severity::Debug,
                    false,
                    &format!("retention removed {:?}", path),
                );
            }
            Err(source) => {
                CameraStats::incr(&self.stats.delete_failures);
                let err = RecorderError::Deletion { path, source };
                self.emit(self.sink.as_ref(), Severity::Error, false, &err.to_string());
            }
        }
    }

    fn reap_drained(&mut self) {
        self.draining.retain(|s| !s.handle.has_exited());
    }

    async fn shutdown(&mut self) {
        if let Some(prev) = self.previous.take() {
            self.stop_session(prev);
        }
        if let Some(cur) = self.current.take() {
            self.stop_session(cur);
        }
        self.state = SchedulerState::Stopped;

        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        loop {
            self.reap_drained();
            if self.draining.is_empty() || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }

        if self.draining.is_empty() {
            self.info("all sessions stopped");
        } else {
            let pids: Vec<u32> = self.draining.iter().map(|s| s.handle.id()).collect();
            self.warn(&format!("sessions still exiting after shutdown: {:?}", pids));
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Sleeps for `d`; false if cancelled first.
async fn pause(d: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(d) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_rejects_large_overlap() {
        let s = Duration::from_secs;
        assert!(SegmentTiming::new(s(60), s(30)).is_err());
        assert!(SegmentTiming::new(s(60), s(31)).is_err());
        assert!(SegmentTiming::new(s(60), s(0)).is_err());
        assert!(SegmentTiming::new(s(60), s(29)).is_ok());
    }

    #[test]
    fn timing_waits() {
        let t = SegmentTiming::new(Duration::from_secs(60), Duration::from_secs(10)).unwrap();
        assert_eq!(t.bootstrap_wait(), Duration::from_secs(50));
        assert_eq!(t.solo_wait(), Duration::from_secs(40));
        // one full cycle = overlap + solo = segment - overlap
        assert_eq!(t.overlap() + t.solo_wait(), t.bootstrap_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_returns_false_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!pause(Duration::from_secs(3600), &token).await);
        assert!(pause(Duration::from_secs(1), &CancellationToken::new()).await);
    }
}
