use std::path::PathBuf;
use thiserror::Error;

pub type RecorderResult<T> = Result<T, RecorderError>;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// Transcoder could not be invoked at all. Fatal for the camera.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Signal could not be delivered. Logged, never fatal.
    #[error("failed to terminate session pid={pid}: {message}")]
    Terminate { pid: u32, message: String },
    /// Retention cleanup failed. Logged, never fatal.
    #[error("failed to delete {path:?}: {source}")]
    Deletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RecorderError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error must stop the camera's scheduler.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Launch { .. } | Self::Io { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{message}")]
    Message { message: String },
}

impl ConfigError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read response from {url}: {source}")]
    Read {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("api key unavailable ({path:?}): {message}")]
    ApiKey { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_and_io_errors_are_fatal() {
        let launch = RecorderError::Launch {
            program: "ffmpeg".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(launch.is_fatal());
        assert!(launch.to_string().contains("ffmpeg"));

        let io = RecorderError::io(
            "create dir",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(io.is_fatal());
    }

    #[test]
    fn terminate_and_deletion_errors_are_not_fatal() {
        let term = RecorderError::Terminate {
            pid: 42,
            message: "EPERM".into(),
        };
        assert!(!term.is_fatal());

        let del = RecorderError::Deletion {
            path: PathBuf::from("/tmp/x.mp4"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(!del.is_fatal());
        assert!(del.to_string().contains("x.mp4"));
    }

    #[test]
    fn config_error_displays_message() {
        assert_eq!(ConfigError::message("bad overlap").to_string(), "bad overlap");
    }
}
