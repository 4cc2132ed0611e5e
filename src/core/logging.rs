// src/core/logging.rs
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::timestamp::utc_ns_now;

// Global sequence number for correlating lines across workers
static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub instance_id: String,
    pub sequence: u64,
    pub timestamp_ns: u64,
}

impl LogContext {
    pub fn new(component: &str, instance_id: &str) -> Self {
        Self {
            component: component.to_string(),
            instance_id: instance_id.to_string(),
            sequence: LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp_ns: utc_ns_now(),
        }
    }

    pub fn format(&self, level: &str, message: &str) -> String {
        format!(
            "[{}][seq={:06}][{}:{}] {}",
            level, self.sequence, self.component, self.instance_id, message
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

/// Destination for scheduler events. Shared by all workers, so writes must
/// be safe from many threads at once.
pub trait EventSink: Send + Sync {
    fn write(&self, message: &str, severity: Severity, echo: bool);
}

/// Forwards events to the `log` facade and optionally echoes them to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn write(&self, message: &str, severity: Severity, echo: bool) {
        match severity {
            Severity::Debug => log::debug!("{}", message),
            Severity::Info => log::info!("{}", message),
            Severity::Error => log::error!("{}", message),
            Severity::Fatal => log::error!("[FATAL] {}", message),
        }

        if echo {
            println!("{}", message);
        }
    }
}

// Helper trait for uniform component logging
pub trait ComponentLogger {
    fn log_context(&self) -> LogContext;

    fn debug(&self, message: &str) {
        let ctx = self.log_context();
        log::debug!("{}", ctx.format("DEBUG", message));
    }

    fn info(&self, message: &str) {
        let ctx = self.log_context();
        log::info!("{}", ctx.format("INFO", message));
    }

    fn warn(&self, message: &str) {
        let ctx = self.log_context();
        log::warn!("{}", ctx.format("WARN", message));
    }

    fn error(&self, message: &str) {
        let ctx = self.log_context();
        log::error!("{}", ctx.format("ERROR", message));
    }

    /// Route through an `EventSink` with the component prefix applied.
    fn emit(&self, sink: &dyn EventSink, severity: Severity, echo: bool, message: &str) {
        let ctx = self.log_context();
        sink.write(&ctx.format(severity.as_str(), message), severity, echo);
    }
}

/// Installs env_logger. With `file` set, log lines are appended there
/// instead of stderr; console echo from `LogSink` still goes to stdout.
pub fn init_logging(file: Option<&Path>) -> anyhow::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();

    if let Some(path) = file {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(f)));
    }

    builder.try_init()?;
    Ok(())
}
