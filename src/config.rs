use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use crate::core::error::ConfigError;
use crate::recorder::{RecordingSettings, SegmentTiming};
use crate::types::CameraDescriptor;

// ---------- Recording ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordingConfig {
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u64,
    #[serde(default = "default_overlap_secs")]
    pub overlap_secs: u64,
    /// 0 = unlimited
    #[serde(default)]
    pub retention_count: usize,
    #[serde(default = "default_transcoder")]
    pub transcoder: String,
    #[serde(default = "default_video_root")]
    pub video_root: PathBuf,
}

fn default_segment_secs() -> u64 {
    3600
}

fn default_overlap_secs() -> u64 {
    10
}

fn default_transcoder() -> String {
    "ffmpeg".into()
}

fn default_video_root() -> PathBuf {
    PathBuf::from("videos")
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            segment_secs: default_segment_secs(),
            overlap_secs: default_overlap_secs(),
            retention_count: 0,
            transcoder: default_transcoder(),
            video_root: default_video_root(),
        }
    }
}

impl RecordingConfig {
    pub fn timing(&self) -> Result<SegmentTiming, ConfigError> {
        if self.segment_secs == 0 {
            return Err(ConfigError::message("recording.segment_secs must be > 0"));
        }
        SegmentTiming::new(
            Duration::from_secs(self.segment_secs),
            Duration::from_secs(self.overlap_secs),
        )
    }

    pub fn settings(&self) -> Result<RecordingSettings, ConfigError> {
        Ok(RecordingSettings {
            timing: self.timing()?,
            retention_count: self.retention_count,
            program: self.transcoder.clone(),
        })
    }
}

// ---------- Logging ----------
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LoggingConfig {
    pub file: Option<PathBuf>,
}

// ---------- Monitoring ----------
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub http_port: u16,
}

// ---------- Static cameras ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    pub serial: String,
    pub stream_url: String,
    pub output_dir: Option<PathBuf>,
}

// ---------- Discovery ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub org_id: String,
    #[serde(default = "default_api_base")]
    pub base_url: String,
    #[serde(default = "default_api_key_file")]
    pub api_key_file: PathBuf,
    /// Placeholders: `{lan_ip}`, `{lan_ip_dashed}`, `{serial}`
    pub stream_url_template: String,
    #[serde(default = "default_probe_port")]
    pub probe_port: u16,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_api_base() -> String {
    "https://api.meraki.com/api/v0".into()
}

fn default_api_key_file() -> PathBuf {
    PathBuf::from("apikey")
}

fn default_probe_port() -> u16 {
    443
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

// ---------- Root ----------
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    pub discovery: Option<DiscoveryConfig>,
}

// ---------- Loader ----------
pub fn load(path: &str) -> anyhow::Result<Config> {
    let txt = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    parse(&txt)
}

pub fn parse(txt: &str) -> anyhow::Result<Config> {
    let cfg: Config = toml::from_str(txt)?;
    cfg.validate().context("config validation failed")?;
    Ok(cfg)
}

impl Config {
    pub fn discovery_enabled(&self) -> bool {
        self.discovery.as_ref().is_some_and(|d| d.enabled)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.recording.timing()?;

        // A single slot would evict the segment that is still being written
        // during the overlap.
        if self.recording.retention_count == 1 {
            bail!("recording.retention_count must be 0 (unlimited) or at least 2");
        }

        if self.recording.transcoder.trim().is_empty() {
            bail!("recording.transcoder must not be empty");
        }

        let mut seen = BTreeSet::new();
        for cam in &self.cameras {
            if cam.serial.trim().is_empty() {
                bail!("camera serial must not be empty");
            }
            if cam.stream_url.trim().is_empty() {
                bail!("camera '{}' requires stream_url", cam.serial);
            }
            if !seen.insert(cam.serial.as_str()) {
                bail!("duplicate camera serial '{}'", cam.serial);
            }
        }

        if let Some(d) = self.discovery.as_ref().filter(|d| d.enabled) {
            if d.org_id.trim().is_empty() {
                bail!("discovery.org_id must not be empty");
            }
            if d.stream_url_template.trim().is_empty() {
                bail!("discovery.stream_url_template must not be empty");
            }
        }

        if self.cameras.is_empty() && !self.discovery_enabled() {
            bail!("no cameras configured and discovery disabled");
        }

        Ok(())
    }

    pub fn output_dir_for(&self, serial: &str) -> PathBuf {
        self.recording.video_root.join(serial)
    }

    pub fn static_cameras(&self) -> Vec<CameraDescriptor> {
        self.cameras
            .iter()
            .map(|c| {
                CameraDescriptor::new(
                    c.serial.clone(),
                    c.stream_url.clone(),
                    c.output_dir
                        .clone()
                        .unwrap_or_else(|| self.output_dir_for(&c.serial)),
                )
            })
            .collect()
    }
}
