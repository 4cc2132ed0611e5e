// src/main.rs

use std::sync::Arc;

use anyhow::{Context, bail};
use log::{error, info, warn};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use cam_archiver::config::{self, Config};
use cam_archiver::core::logging::init_logging;
use cam_archiver::monitoring::{self, StatsRegistry};
use cam_archiver::{
    CameraDescriptor, CameraOutcome, FfmpegTranscoder, LogSink, Supervisor, discovery,
};

fn main() -> anyhow::Result<()> {
    // ------------------------------------------------------------
    // Config + logging
    // ------------------------------------------------------------
    let cfg_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".into());

    let cfg: Config = config::load(&cfg_path)?;
    init_logging(cfg.logging.file.as_deref())?;
    info!("[archiver] loaded {}", cfg_path);

    let settings = cfg.recording.settings()?;

    // ------------------------------------------------------------
    // Cameras
    // ------------------------------------------------------------
    let cameras = resolve_cameras(&cfg)?;
    if cameras.is_empty() {
        bail!("no reachable cameras, nothing to record");
    }
    for cam in &cameras {
        info!("[archiver] {} -> {:?}", cam.serial, cam.output_dir);
    }

    // ------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------
    let shutdown = CancellationToken::new();
    {
        let s = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("[archiver] shutdown requested");
            s.cancel();
        })?;
    }

    // ------------------------------------------------------------
    // Monitoring
    // ------------------------------------------------------------
    let stats = Arc::new(StatsRegistry::new());
    if cfg.monitoring.http_port != 0 {
        let bind = format!("0.0.0.0:{}", cfg.monitoring.http_port);
        monitoring::start_monitoring_server(&bind, stats.clone())?;
    }

    // ------------------------------------------------------------
    // Recorders
    // ------------------------------------------------------------
    let supervisor = Supervisor::new(
        settings,
        Arc::new(FfmpegTranscoder::new()),
        Arc::new(LogSink),
        stats,
    );

    info!(
        "[archiver] recording {} camera(s), Ctrl+C to stop",
        cameras.len()
    );

    let rt = Runtime::new().context("starting tokio runtime")?;
    let report = rt.block_on(supervisor.run(cameras, shutdown));

    for (serial, outcome) in &report.cameras {
        match outcome {
            CameraOutcome::Stopped => info!("[archiver] {} stopped", serial),
            CameraOutcome::Failed(msg) => error!("[archiver] {} failed: {}", serial, msg),
        }
    }
    info!("[archiver] shutdown complete");

    if report.failed() > 0 && report.failed() == report.cameras.len() {
        bail!("every camera recorder failed");
    }
    Ok(())
}

fn resolve_cameras(cfg: &Config) -> anyhow::Result<Vec<CameraDescriptor>> {
    let static_cams = cfg.static_cameras();

    let Some(d) = cfg.discovery.as_ref().filter(|d| d.enabled) else {
        return Ok(static_cams);
    };

    match discovery::discover(d, &cfg.recording.video_root) {
        Ok(found) => Ok(discovery::merge(static_cams, found)),
        Err(e) if !static_cams.is_empty() => {
            warn!("[archiver] discovery failed, using static cameras only: {}", e);
            Ok(static_cams)
        }
        Err(e) => Err(e).context("camera discovery failed"),
    }
}
