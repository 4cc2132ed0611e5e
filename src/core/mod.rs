pub mod error;
pub mod lock;
pub mod logging;
pub mod timestamp;

pub use error::{ConfigError, DiscoveryError, RecorderError, RecorderResult};
pub use logging::{ComponentLogger, EventSink, LogContext, LogSink, Severity};
pub use timestamp::*;
