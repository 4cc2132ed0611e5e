// src/recorder/process.rs
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::process::{Child, Command};

use super::{SessionHandle, Transcoder, TranscoderCommand};
use crate::core::error::{RecorderError, RecorderResult};
use crate::core::lock::lock_mutex;

const REAP_POLL: Duration = Duration::from_millis(100);

/// Spawns the external transcoder via tokio. Must be called from inside a
/// tokio runtime: every child is handed to a reaper task.
#[derive(Debug, Default, Clone)]
pub struct FfmpegTranscoder;

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self
    }
}

impl Transcoder for FfmpegTranscoder {
    fn start(&self, command: &TranscoderCommand) -> RecorderResult<Box<dyn SessionHandle>> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| RecorderError::Launch {
                program: command.program.clone(),
                source,
            })?;

        let pid = child.id().unwrap_or(0);
        let child = Arc::new(Mutex::new(child));
        let exited = Arc::new(AtomicBool::new(false));

        // Reaper: the child is only ever reaped under its lock, so a pid seen
        // under that lock still belongs to this process.
        let reaper_child = child.clone();
        let flag = exited.clone();
        let output = command.output.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(REAP_POLL).await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let mut guard = lock_mutex(&reaper_child, "transcoder child");
                match guard.try_wait() {
                    Ok(Some(status)) => {
                        debug!("[transcoder] pid={} exited {} ({:?})", pid, status, output);
                        flag.store(true, Ordering::SeqCst);
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("[transcoder] pid={} wait failed: {}", pid, e);
                        flag.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            }
        });

        Ok(Box::new(ProcessSession { pid, child, exited }))
    }
}

pub struct ProcessSession {
    pid: u32,
    child: Arc<Mutex<Child>>,
    exited: Arc<AtomicBool>,
}

impl SessionHandle for ProcessSession {
    fn id(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> RecorderResult<()> {
        if self.has_exited() {
            return Ok(());
        }

        let mut child = lock_mutex(&self.child, "transcoder child");
        match child.try_wait() {
            Ok(Some(_)) => {
                self.exited.store(true, Ordering::SeqCst);
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => {
                return Err(RecorderError::Terminate {
                    pid: self.pid,
                    message: e.to_string(),
                });
            }
        }

        // Still unreaped while the lock is held, so the pid cannot have been
        // recycled.
        match child.id() {
            Some(pid) => send_interrupt(pid),
            None => Ok(()),
        }
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

// SIGINT lets ffmpeg write the moov atom before exiting.
#[cfg(unix)]
fn send_interrupt(pid: u32) -> RecorderResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(RecorderError::Terminate {
            pid,
            message: e.to_string(),
        }),
    }
}

#[cfg(not(unix))]
fn send_interrupt(pid: u32) -> RecorderResult<()> {
    Err(RecorderError::Terminate {
        pid,
        message: "graceful interrupt is only supported on unix".into(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    fn sleeper(secs: &str) -> TranscoderCommand {
        TranscoderCommand {
            program: "sleep".into(),
            stream_url: String::new(),
            output: Path::new("unused").to_path_buf(),
            args: vec![secs.into()],
        }
    }

    async fn wait_exit(handle: &dyn SessionHandle) -> bool {
        for _ in 0..100 {
            if handle.has_exited() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn missing_program_is_launch_error() {
        let cmd = TranscoderCommand {
            program: "/nonexistent/transcoder-binary".into(),
            stream_url: String::new(),
            output: Path::new("x.mp4").to_path_buf(),
            args: vec![],
        };
        match FfmpegTranscoder::new().start(&cmd) {
            Err(RecorderError::Launch { program, .. }) => {
                assert_eq!(program, "/nonexistent/transcoder-binary")
            }
            other => panic!("expected launch error, got ok={}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn terminate_stops_and_reaps_process() {
        let mut handle = FfmpegTranscoder::new().start(&sleeper("30")).unwrap();
        assert!(handle.id() > 0);
        assert!(!handle.has_exited());

        handle.terminate().unwrap();
        assert!(wait_exit(handle.as_ref()).await);
    }

    #[tokio::test]
    async fn terminate_reaps_exited_child_itself() {
        let mut handle = FfmpegTranscoder::new().start(&sleeper("0")).unwrap();

        // Block the only runtime thread so the reaper cannot run: the child
        // exits but stays unreaped.
        std::thread::sleep(Duration::from_millis(300));
        assert!(!handle.has_exited());

        handle.terminate().unwrap();
        assert!(handle.has_exited());
    }

    #[tokio::test]
    async fn terminate_after_exit_is_ok() {
        let mut handle = FfmpegTranscoder::new().start(&sleeper("0")).unwrap();
        assert!(wait_exit(handle.as_ref()).await);

        handle.terminate().unwrap();
        handle.terminate().unwrap();
    }
}
