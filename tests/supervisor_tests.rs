// tests/supervisor_tests.rs
// One task per camera: failures stay local, cancellation reaches everyone.

use std::sync::Arc;
use std::time::Duration;

use cam_archiver::monitoring::{CameraStats, StatsRegistry};
use cam_archiver::testing::{MemorySink, MockEvent, MockTranscoder};
use cam_archiver::{
    CameraDescriptor, CameraOutcome, RecordingSettings, SegmentTiming, Severity, Supervisor,
};
use tokio_util::sync::CancellationToken;

const URL_A: &str = "https://10-0-0-1.cam/hls/high/A.m3u8";
const URL_B: &str = "https://10-0-0-2.cam/hls/high/B.m3u8";

fn settings() -> RecordingSettings {
    RecordingSettings {
        timing: SegmentTiming::new(Duration::from_secs(60), Duration::from_secs(10)).unwrap(),
        retention_count: 3,
        program: "ffmpeg".into(),
    }
}

fn start_secs(events: &[MockEvent], url: &str) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            MockEvent::Started { stream_url, at, .. } if stream_url == url => Some(at.as_secs()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_failing_camera_does_not_stop_the_others() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let transcoder = Arc::new(MockTranscoder::new().fail_stream(URL_B, 2));
    let sink = Arc::new(MemorySink::new());
    let stats = Arc::new(StatsRegistry::new());
    let supervisor = Supervisor::new(settings(), transcoder.clone(), sink.clone(), stats.clone());

    let cameras = vec![
        CameraDescriptor::new("Q2FV-AAAA-0001", URL_A, dir_a.path()),
        CameraDescriptor::new("Q2FV-BBBB-0002", URL_B, dir_b.path()),
    ];

    let shutdown = CancellationToken::new();
    let run = {
        let token = shutdown.clone();
        tokio::spawn(async move { supervisor.run(cameras, token).await })
    };

    tokio::time::sleep(Duration::from_secs(175)).await;
    // B gave up at 50s, A is still recording
    assert!(stats.camera("Q2FV-AAAA-0001").is_running());
    assert!(!stats.camera("Q2FV-BBBB-0002").is_running());

    shutdown.cancel();
    let report = run.await.unwrap();

    assert_eq!(report.cameras.len(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.outcome("Q2FV-AAAA-0001"), Some(&CameraOutcome::Stopped));
    assert!(matches!(
        report.outcome("Q2FV-BBBB-0002"),
        Some(CameraOutcome::Failed(_))
    ));

    let events = transcoder.events();
    assert_eq!(start_secs(&events, URL_A), [0, 50, 100, 150]);
    assert_eq!(start_secs(&events, URL_B), [0]);

    let a = stats.camera("Q2FV-AAAA-0001");
    assert_eq!(CameraStats::get(&a.sessions_started), 4);
    assert_eq!(CameraStats::get(&a.launch_failures), 0);
    let b = stats.camera("Q2FV-BBBB-0002");
    assert_eq!(CameraStats::get(&b.launch_failures), 1);

    assert_eq!(sink.count(Severity::Fatal), 1);
    // every started session was stopped
    let stopped = transcoder.terminations().len();
    assert_eq!(stopped, transcoder.starts().len());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_every_camera() {
    let dirs: Vec<_> = (0..3).map(|_| tempfile::tempdir().unwrap()).collect();
    let transcoder = Arc::new(MockTranscoder::new());
    let stats = Arc::new(StatsRegistry::new());
    let supervisor = Supervisor::new(
        settings(),
        transcoder.clone(),
        Arc::new(MemorySink::new()),
        stats.clone(),
    );

    let cameras: Vec<CameraDescriptor> = dirs
        .iter()
        .enumerate()
        .map(|(i, d)| {
            CameraDescriptor::new(format!("CAM-{}", i), format!("rtsp://cam{}/live", i), d.path())
        })
        .collect();

    let shutdown = CancellationToken::new();
    let run = {
        let token = shutdown.clone();
        tokio::spawn(async move { supervisor.run(cameras, token).await })
    };

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(stats.any_running());
    shutdown.cancel();

    let report = run.await.unwrap();
    assert_eq!(report.cameras.len(), 3);
    assert_eq!(report.failed(), 0);
    assert!(!stats.any_running());

    let terminations = transcoder.terminations();
    assert_eq!(terminations.len(), 3);
    assert!(terminations.iter().all(|(at, _)| *at == Duration::from_secs(30)));
}

#[tokio::test]
async fn test_no_cameras_yields_empty_report() {
    let supervisor = Supervisor::new(
        settings(),
        Arc::new(MockTranscoder::new()),
        Arc::new(MemorySink::new()),
        Arc::new(StatsRegistry::new()),
    );
    let report = supervisor.run(Vec::new(), CancellationToken::new()).await;
    assert!(report.cameras.is_empty());
    assert_eq!(report.failed(), 0);
}
