use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One camera handed to a scheduler. Immutable once recording starts.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CameraDescriptor {
    pub serial: String,
    pub stream_url: String,
    pub output_dir: PathBuf,
}

impl CameraDescriptor {
    pub fn new(
        serial: impl Into<String>,
        stream_url: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            serial: serial.into(),
            stream_url: stream_url.into(),
            output_dir: output_dir.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraOutcome {
    Stopped,
    Failed(String),
}

#[derive(Clone, Debug, Default)]
pub struct SupervisorReport {
    pub cameras: Vec<(String, CameraOutcome)>,
}

impl SupervisorReport {
    pub fn outcome(&self, serial: &str) -> Option<&CameraOutcome> {
        self.cameras
            .iter()
            .find(|(s, _)| s == serial)
            .map(|(_, outcome)| outcome)
    }

    pub fn failed(&self) -> usize {
        self.cameras
            .iter()
            .filter(|(_, o)| matches!(o, CameraOutcome::Failed(_)))
            .count()
    }
}
