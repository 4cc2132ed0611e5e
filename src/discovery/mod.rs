// src/discovery/mod.rs
//
// Finds cameras through the cloud inventory API, keeps the ones reachable on
// the LAN and turns them into descriptors for the supervisor.

pub mod meraki;
pub mod probe;

use std::path::Path;
use std::time::Duration;

use log::{info, warn};

use crate::config::DiscoveryConfig;
use crate::core::error::DiscoveryError;
use crate::types::CameraDescriptor;

pub use meraki::{DeviceDetails, InventoryDevice, MerakiClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCamera {
    pub serial: String,
    pub name: Option<String>,
    pub lan_ip: String,
}

pub fn render_stream_url(template: &str, lan_ip: &str, serial: &str) -> String {
    template
        .replace("{lan_ip_dashed}", &lan_ip.replace('.', "-"))
        .replace("{lan_ip}", lan_ip)
        .replace("{serial}", serial)
}

/// Splits cameras by `is_reachable`, logging each verdict.
pub fn select_reachable<F>(
    cameras: Vec<DiscoveredCamera>,
    mut is_reachable: F,
) -> (Vec<DiscoveredCamera>, usize)
where
    F: FnMut(&DiscoveredCamera) -> bool,
{
    let mut reachable = Vec::new();
    let mut unreachable = 0;

    for cam in cameras {
        info!(
            "[discovery] probing {} ({}) at {}",
            cam.name.as_deref().unwrap_or("-"),
            cam.serial,
            cam.lan_ip
        );
        if is_reachable(&cam) {
            reachable.push(cam);
        } else {
            warn!("[discovery] {} not reachable locally", cam.serial);
            unreachable += 1;
        }
    }

    info!(
        "[discovery] reachable: {}, unreachable: {}",
        reachable.len(),
        unreachable
    );
    (reachable, unreachable)
}

pub fn to_descriptors(
    cameras: &[DiscoveredCamera],
    template: &str,
    video_root: &Path,
) -> Vec<CameraDescriptor> {
    cameras
        .iter()
        .map(|c| {
            CameraDescriptor::new(
                c.serial.clone(),
                render_stream_url(template, &c.lan_ip, &c.serial),
                video_root.join(&c.serial),
            )
        })
        .collect()
}

/// Static entries win over discovered ones with the same serial.
pub fn merge(
    static_cams: Vec<CameraDescriptor>,
    discovered: Vec<CameraDescriptor>,
) -> Vec<CameraDescriptor> {
    let mut out = static_cams;
    for cam in discovered {
        if out.iter().any(|c| c.serial == cam.serial) {
            info!("[discovery] {} overridden by static config", cam.serial);
            continue;
        }
        out.push(cam);
    }
    out
}

/// Full discovery pass: inventory, device lookup, LAN probe. Blocking.
pub fn discover(
    cfg: &DiscoveryConfig,
    video_root: &Path,
) -> Result<Vec<CameraDescriptor>, DiscoveryError> {
    let api_key = meraki::read_api_key(&cfg.api_key_file)?;
    info!("[discovery] api key {}", meraki::redact_key(&api_key));

    let client = MerakiClient::new(&cfg.base_url, api_key);
    let inventory = client.inventory(&cfg.org_id)?;
    if inventory.is_empty() {
        warn!("[discovery] organisation {} has no cameras", cfg.org_id);
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for dev in inventory {
        let Some(network_id) = dev.network_id.as_deref() else {
            warn!("[discovery] {} is not assigned to a network", dev.serial);
            continue;
        };
        let details = match client.device(network_id, &dev.serial) {
            Ok(d) => d,
            Err(e) => {
                warn!("[discovery] device lookup for {} failed: {}", dev.serial, e);
                continue;
            }
        };
        let Some(lan_ip) = details.lan_ip.filter(|ip| !ip.trim().is_empty()) else {
            warn!("[discovery] {} reports no LAN address", dev.serial);
            continue;
        };
        found.push(DiscoveredCamera {
            serial: dev.serial,
            name: details.name.or(dev.name),
            lan_ip,
        });
    }

    let timeout = Duration::from_millis(cfg.probe_timeout_ms);
    let (reachable, _) = select_reachable(found, |c| probe::probe(&c.lan_ip, cfg.probe_port, timeout));

    Ok(to_descriptors(&reachable, &cfg.stream_url_template, video_root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cam(serial: &str, ip: &str) -> DiscoveredCamera {
        DiscoveredCamera {
            serial: serial.into(),
            name: None,
            lan_ip: ip.into(),
        }
    }

    #[test]
    fn stream_url_placeholders() {
        let url = render_stream_url(
            "https://{lan_ip_dashed}.abc.devices.example/hls/high/{serial}.m3u8?ip={lan_ip}",
            "172.20.6.115",
            "Q2FV-0001",
        );
        assert_eq!(
            url,
            "https://172-20-6-115.abc.devices.example/hls/high/Q2FV-0001.m3u8?ip=172.20.6.115"
        );
    }

    #[test]
    fn unreachable_cameras_are_dropped() {
        let cams = vec![cam("a", "10.0.0.1"), cam("b", "10.0.0.2"), cam("c", "10.0.0.3")];
        let (ok, bad) = select_reachable(cams, |c| c.serial != "b");
        assert_eq!(bad, 1);
        assert_eq!(ok.iter().map(|c| c.serial.as_str()).collect::<Vec<_>>(), ["a", "c"]);
    }

    #[test]
    fn descriptors_use_video_root() {
        let d = to_descriptors(&[cam("Q2", "10.1.2.3")], "rtsp://{lan_ip}/live", Path::new("/v"));
        assert_eq!(d[0].stream_url, "rtsp://10.1.2.3/live");
        assert_eq!(d[0].output_dir, PathBuf::from("/v/Q2"));
    }

    #[test]
    fn static_entries_take_precedence() {
        let s = vec![CameraDescriptor::new("Q2", "rtsp://static", "/s/Q2")];
        let d = vec![
            CameraDescriptor::new("Q2", "rtsp://found", "/v/Q2"),
            CameraDescriptor::new("Q3", "rtsp://found3", "/v/Q3"),
        ];
        let merged = merge(s, d);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].stream_url, "rtsp://static");
        assert_eq!(merged[1].serial, "Q3");
    }
}
