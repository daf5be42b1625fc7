//! Process execution utilities with timeout support
//!
//! Every external tool (yt-dlp, ffmpeg, ffprobe) runs under a deadline so a
//! hung process cannot hold a download slot forever.

use std::io::Read;
use std::process::{Child, ExitStatus, Output};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;

/// Poll interval for blocking child processes
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
}

impl ProcessError {
    /// The executable is not installed or not on PATH.
    pub fn is_missing_binary(&self) -> bool {
        matches!(self, ProcessError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    pub fn spawn(program: &str, source: std::io::Error) -> Self {
        ProcessError::Spawn {
            program: program.to_string(),
            source,
        }
    }
}

/// Runs an async command, killing it if it outlives `timeout`.
///
/// The command should have `kill_on_drop(true)` set; dropping the future on
/// timeout then terminates the child.
pub async fn run_with_timeout(cmd: &mut Command, program: &str, timeout: Duration) -> Result<Output, ProcessError> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(ProcessError::spawn(program, e)),
        Err(_) => Err(ProcessError::TimedOut {
            program: program.to_string(),
            timeout,
        }),
    }
}

/// Waits for a blocking child with a deadline. Kills the child on timeout.
///
/// Stdout and stderr are drained on helper threads so a chatty process can
/// not block on a full pipe while we poll.
pub fn wait_with_output_timeout(mut child: Child, program: &str, timeout: Duration) -> Result<Output, ProcessError> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let deadline = Instant::now() + timeout;

    let status: ExitStatus = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    log::error!("{} timed out after {}s, killing", program, timeout.as_secs());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProcessError::TimedOut {
                        program: program.to_string(),
                        timeout,
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                let _ = child.kill();
                return Err(ProcessError::Wait {
                    program: program.to_string(),
                    source,
                });
            }
        }
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<std::thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
