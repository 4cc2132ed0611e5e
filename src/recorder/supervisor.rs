// src/recorder/supervisor.rs

use std::sync::Arc;

use log::{error, info};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{RecordingSettings, SegmentScheduler, Transcoder};
use crate::core::logging::EventSink;
use crate::monitoring::StatsRegistry;
use crate::types::{CameraDescriptor, CameraOutcome, SupervisorReport};

/// Runs one scheduler task per camera. Cameras share nothing; a failing
/// camera ends only its own task.
pub struct Supervisor {
    settings: RecordingSettings,
    transcoder: Arc<dyn Transcoder>,
    sink: Arc<dyn EventSink>,
    stats: Arc<StatsRegistry>,
}

impl Supervisor {
    pub fn new(
        settings: RecordingSettings,
        transcoder: Arc<dyn Transcoder>,
        sink: Arc<dyn EventSink>,
        stats: Arc<StatsRegistry>,
    ) -> Self {
        Self {
            settings,
            transcoder,
            sink,
            stats,
        }
    }

    /// Blocks until every camera task has exited: cancelled through
    /// `shutdown` or failed on its own.
    pub async fn run(
        &self,
        cameras: Vec<CameraDescriptor>,
        shutdown: CancellationToken,
    ) -> SupervisorReport {
        let mut tasks = JoinSet::new();

        for camera in cameras {
            let serial = camera.serial.clone();
            let mut scheduler = SegmentScheduler::new(
                Arc::new(camera),
                self.settings.clone(),
                self.transcoder.clone(),
                self.sink.clone(),
                self.stats.camera(&serial),
            );
            let token = shutdown.child_token();

            info!("[supervisor] spawning recorder for {}", serial);
            tasks.spawn(async move {
                let result = scheduler.run(token).await;
                (serial, result)
            });
        }

        let mut report = SupervisorReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((serial, Ok(()))) => {
                    info!("[supervisor] {} stopped", serial);
                    report.cameras.push((serial, CameraOutcome::Stopped));
                }
                Ok((serial, Err(e))) => {
                    error!("[supervisor] {} failed: {}", serial, e);
                    report.cameras.push((serial, CameraOutcome::Failed(e.to_string())));
                }
                Err(e) => {
                    error!("[supervisor] recorder task aborted: {}", e);
                    report
                        .cameras
                        .push(("<unknown>".to_string(), CameraOutcome::Failed(e.to_string())));
                }
            }
        }

        info!(
            "[supervisor] all recorders exited ({} failed of {})",
            report.failed(),
            report.cameras.len()
        );
        report
    }
}
