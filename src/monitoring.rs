use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::core::lock::lock_mutex;

/// Per-camera counters. Written only by that camera's scheduler.
#[derive(Debug, Default)]
pub struct CameraStats {
    pub running: AtomicBool,
    pub sessions_started: AtomicU64,
    pub sessions_terminated: AtomicU64,
    pub launch_failures: AtomicU64,
    pub terminate_failures: AtomicU64,
    pub files_deleted: AtomicU64,
    pub delete_failures: AtomicU64,
}

impl CameraStats {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct StatsRegistry {
    cameras: Mutex<BTreeMap<String, Arc<CameraStats>>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stats block for `serial`, creating it on first use.
    pub fn camera(&self, serial: &str) -> Arc<CameraStats> {
        let mut map = lock_mutex(&self.cameras, "stats registry");
        map.entry(serial.to_string()).or_default().clone()
    }

    pub fn snapshot(&self) -> Vec<(String, Arc<CameraStats>)> {
        let map = lock_mutex(&self.cameras, "stats registry");
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn any_running(&self) -> bool {
        self.snapshot().iter().any(|(_, s)| s.is_running())
    }
}

pub fn start_monitoring_server(bind: &str, stats: Arc<StatsRegistry>) -> anyhow::Result<()> {
    let server = Server::http(bind).map_err(|e| anyhow::anyhow!(e))?;
    log::info!("[monitoring] server on {}", bind);

    thread::spawn(move || {
        for req in server.incoming_requests() {
            let response = match (req.method(), req.url()) {
                (&Method::Get, "/health") => {
                    let running = stats.any_running();
                    let status = if running { StatusCode(200) } else { StatusCode(503) };
                    let body = if running { "ok" } else { "not_running" };
                    text_response(body.to_string(), "text/plain").with_status_code(status)
                }
                (&Method::Get, "/metrics") => {
                    text_response(build_metrics(&stats), "text/plain; version=0.0.4")
                }
                _ => text_response(String::new(), "text/plain").with_status_code(StatusCode(404)),
            };
            let _ = req.respond(response);
        }
    });

    Ok(())
}

fn text_response(body: String, content_type: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let response = Response::from_string(body);
    match Header::from_bytes("Content-Type", content_type) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

pub fn build_metrics(stats: &StatsRegistry) -> String {
    let cameras = stats.snapshot();
    let mut output = String::new();

    let _ = writeln!(
        output,
        "# HELP archiver_camera_running Whether the camera's scheduler is active."
    );
    let _ = writeln!(output, "# TYPE archiver_camera_running gauge");
    for (serial, s) in &cameras {
        let _ = writeln!(
            output,
            "archiver_camera_running{{camera=\"{}\"}} {}",
            escape_label_value(serial),
            u8::from(s.is_running())
        );
    }

    let counters: [(&str, &str, fn(&CameraStats) -> &AtomicU64); 6] = [
        ("sessions_started_total", "Transcoder sessions launched.", |s| &s.sessions_started),
        ("sessions_terminated_total", "Graceful terminations sent.", |s| &s.sessions_terminated),
        ("launch_failures_total", "Transcoder launches that failed.", |s| &s.launch_failures),
        ("terminate_failures_total", "Termination signals that failed.", |s| &s.terminate_failures),
        ("files_deleted_total", "Segments removed by retention.", |s| &s.files_deleted),
        ("delete_failures_total", "Retention deletions that failed.", |s| &s.delete_failures),
    ];

    for (name, help, field) in counters {
        let _ = writeln!(output, "# HELP archiver_{} {}", name, help);
        let _ = writeln!(output, "# TYPE archiver_{} counter", name);
        for (serial, s) in &cameras {
            let _ = writeln!(
                output,
                "archiver_{}{{camera=\"{}\"}} {}",
                name,
                escape_label_value(serial),
                CameraStats::get(field(s))
            );
        }
    }

    output
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_reuses_camera_entry() {
        let reg = StatsRegistry::new();
        let a = reg.camera("cam-1");
        CameraStats::incr(&a.sessions_started);
        let b = reg.camera("cam-1");
        assert_eq!(CameraStats::get(&b.sessions_started), 1);
        assert_eq!(reg.snapshot().len(), 1);
    }

    #[test]
    fn health_follows_running_flags() {
        let reg = StatsRegistry::new();
        let cam = reg.camera("cam-1");
        assert!(!reg.any_running());
        cam.running.store(true, Ordering::Relaxed);
        assert!(reg.any_running());
    }

    #[test]
    fn metrics_have_camera_labels() {
        let reg = StatsRegistry::new();
        let cam = reg.camera("Q2\"X");
        CameraStats::incr(&cam.files_deleted);
        CameraStats::incr(&cam.files_deleted);

        let text = build_metrics(&reg);
        assert!(text.contains("# TYPE archiver_files_deleted_total counter"));
        assert!(text.contains("archiver_files_deleted_total{camera=\"Q2\\\"X\"} 2"));
        assert!(text.contains("archiver_camera_running{camera=\"Q2\\\"X\"} 0"));
    }
}
