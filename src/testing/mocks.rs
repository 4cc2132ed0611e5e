use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::core::error::{RecorderError, RecorderResult};
use crate::core::lock::lock_mutex;
use crate::core::logging::{EventSink, Severity};
use crate::recorder::{SessionHandle, Transcoder, TranscoderCommand};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Started {
        id: u32,
        stream_url: String,
        output: PathBuf,
        at: Duration,
    },
    Terminated {
        id: u32,
        at: Duration,
    },
}

type EventLog = Arc<Mutex<Vec<MockEvent>>>;

/// In-memory transcoder. Timestamps are taken from the tokio clock relative
/// to construction, so paused-time tests see exact offsets.
pub struct MockTranscoder {
    origin: Instant,
    events: EventLog,
    next_id: AtomicU32,
    // stream url -> 1-based start attempt that fails
    failures: HashMap<String, u64>,
    fail_any: Option<u64>,
    attempts: Mutex<HashMap<String, u64>>,
    total_attempts: Mutex<u64>,
    touch_outputs: bool,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            events: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU32::new(1000),
            failures: HashMap::new(),
            fail_any: None,
            attempts: Mutex::new(HashMap::new()),
            total_attempts: Mutex::new(0),
            touch_outputs: false,
        }
    }

    /// The `attempt`-th start (1-based, any stream) fails to launch.
    pub fn fail_on_start(mut self, attempt: u64) -> Self {
        self.fail_any = Some(attempt);
        self
    }

    /// The `attempt`-th start for `stream_url` fails to launch.
    pub fn fail_stream(mut self, stream_url: &str, attempt: u64) -> Self {
        self.failures.insert(stream_url.to_string(), attempt);
        self
    }

    /// Create an empty file at each session's output path.
    pub fn touch_outputs(mut self) -> Self {
        self.touch_outputs = true;
        self
    }

    pub fn events(&self) -> Vec<MockEvent> {
        lock_mutex(&self.events, "mock events").clone()
    }

    pub fn starts(&self) -> Vec<(Duration, PathBuf)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Started { at, output, .. } => Some((at, output)),
                _ => None,
            })
            .collect()
    }

    pub fn terminations(&self) -> Vec<(Duration, u32)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Terminated { at, id } => Some((at, id)),
                _ => None,
            })
            .collect()
    }

    fn launch_error(&self, command: &TranscoderCommand) -> RecorderError {
        RecorderError::Launch {
            program: command.program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock launch failure"),
        }
    }
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder for MockTranscoder {
    fn start(&self, command: &TranscoderCommand) -> RecorderResult<Box<dyn SessionHandle>> {
        let total = {
            let mut t = lock_mutex(&self.total_attempts, "mock attempts");
            *t += 1;
            *t
        };
        let per_stream = {
            let mut attempts = lock_mutex(&self.attempts, "mock attempts");
            let n = attempts.entry(command.stream_url.clone()).or_insert(0);
            *n += 1;
            *n
        };

        if self.fail_any == Some(total) || self.failures.get(&command.stream_url) == Some(&per_stream)
        {
            return Err(self.launch_error(command));
        }

        if self.touch_outputs {
            std::fs::write(&command.output, b"")
                .map_err(|e| RecorderError::io("mock output", e))?;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock_mutex(&self.events, "mock events").push(MockEvent::Started {
            id,
            stream_url: command.stream_url.clone(),
            output: command.output.clone(),
            at: self.origin.elapsed(),
        });

        Ok(Box::new(MockSession {
            id,
            origin: self.origin,
            events: self.events.clone(),
            exited: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// Exits as soon as it is terminated.
pub struct MockSession {
    id: u32,
    origin: Instant,
    events: EventLog,
    exited: Arc<AtomicBool>,
}

impl SessionHandle for MockSession {
    fn id(&self) -> u32 {
        self.id
    }

    fn terminate(&mut self) -> RecorderResult<()> {
        if self.exited.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        lock_mutex(&self.events, "mock events").push(MockEvent::Terminated {
            id: self.id,
            at: self.origin.elapsed(),
        });
        Ok(())
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

/// Collects sink writes for assertions.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(String, Severity, bool)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, Severity, bool)> {
        lock_mutex(&self.entries, "memory sink").clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        lock_mutex(&self.entries, "memory sink")
            .iter()
            .filter(|(_, s, _)| *s == severity)
            .count()
    }
}

impl EventSink for MemorySink {
    fn write(&self, message: &str, severity: Severity, echo: bool) {
        lock_mutex(&self.entries, "memory sink").push((message.to_string(), severity, echo));
    }
}
