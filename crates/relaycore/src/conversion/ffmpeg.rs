//! ffmpeg / ffprobe backend.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::conversion::{EncodeError, EncodeJob, EncodeMode, Encoder, ProbeError, Prober, StreamInfo};
use crate::core::config::ToolPaths;
use crate::core::process::{run_with_timeout, ProcessError};
use crate::core::utils::remove_quietly;

/// Default timeout for ffprobe metadata queries (30 seconds)
pub const FFPROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Both tools behind one value, availability checked once per process.
pub struct FfmpegToolchain {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    ffmpeg_available: OnceCell<bool>,
    ffprobe_available: OnceCell<bool>,
}

impl FfmpegToolchain {
    pub fn new(tools: &ToolPaths) -> Self {
        Self {
            ffmpeg_bin: tools.ffmpeg_bin.clone(),
            ffprobe_bin: tools.ffprobe_bin.clone(),
            ffmpeg_available: OnceCell::new(),
            ffprobe_available: OnceCell::new(),
        }
    }

    pub async fn ffmpeg_available(&self) -> bool {
        *self
            .ffmpeg_available
            .get_or_init(|| check_tool(&self.ffmpeg_bin))
            .await
    }

    pub async fn ffprobe_available(&self) -> bool {
        *self
            .ffprobe_available
            .get_or_init(|| check_tool(&self.ffprobe_bin))
            .await
    }

    /// ffmpeg arguments for a job (without the binary).
    pub fn build_args(job: &EncodeJob) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            job.input.display().to_string(),
        ];
        match &job.mode {
            EncodeMode::Remux => {
                args.extend(
                    ["-c", "copy", "-bsf:v", "h264_metadata=sample_aspect_ratio=1/1"]
                        .iter()
                        .map(|s| s.to_string()),
                );
            }
            EncodeMode::Transcode { filter, crf } => {
                args.extend([
                    "-vf".to_string(),
                    filter.clone(),
                    "-c:v".to_string(),
                    "libx264".to_string(),
                    "-preset".to_string(),
                    "veryfast".to_string(),
                    "-crf".to_string(),
                    crf.to_string(),
                    "-c:a".to_string(),
                    "aac".to_string(),
                ]);
            }
        }
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        args.push(job.output.display().to_string());
        args
    }
}

/// Check if a tool answers `-version`
async fn check_tool(bin: &str) -> bool {
    let available = Command::new(bin)
        .arg("-version")
        .kill_on_drop(true)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !available {
        log::warn!("{} not found, related features are disabled", bin);
    }
    available
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(3)..].join(" | ")
}

#[async_trait]
impl Encoder for FfmpegToolchain {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn available(&self) -> bool {
        self.ffmpeg_available().await
    }

    async fn encode(&self, job: &EncodeJob) -> Result<(), EncodeError> {
        if !self.ffmpeg_available().await {
            return Err(EncodeError::Unavailable(self.ffmpeg_bin.clone()));
        }

        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(Self::build_args(job)).kill_on_drop(true);

        let result = run_with_timeout(&mut cmd, &self.ffmpeg_bin, job.timeout).await;
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                remove_quietly(&job.output);
                return Err(match e {
                    ProcessError::TimedOut { timeout, .. } => EncodeError::TimedOut(timeout.as_secs()),
                    e if e.is_missing_binary() => EncodeError::Unavailable(e.to_string()),
                    e => EncodeError::Failed(e.to_string()),
                });
            }
        };

        if !output.status.success() {
            remove_quietly(&job.output);
            return Err(EncodeError::Failed(format!(
                "exit {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        if !job.output.is_file() {
            return Err(EncodeError::Failed("ffmpeg produced no output".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_aspect_ratio: Option<String>,
}

fn parse_probe(json: &[u8]) -> Result<StreamInfo, ProbeError> {
    let parsed: ProbeOutput =
        serde_json::from_slice(json).map_err(|e| ProbeError::Failed(format!("bad ffprobe output: {}", e)))?;

    let has_audio = parsed.streams.iter().any(|s| s.codec_type.as_deref() == Some("audio"));
    let video = parsed
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ProbeError::Failed("no video stream".to_string()))?;

    Ok(StreamInfo {
        width: video.width,
        height: video.height,
        sample_aspect_ratio: video.sample_aspect_ratio,
        has_audio,
    })
}

#[async_trait]
impl Prober for FfmpegToolchain {
    async fn probe(&self, path: &Path) -> Result<StreamInfo, ProbeError> {
        if !self.ffprobe_available().await {
            return Err(ProbeError::Unavailable(self.ffprobe_bin.clone()));
        }

        let mut cmd = Command::new(&self.ffprobe_bin);
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "stream=codec_type,width,height,sample_aspect_ratio",
            "-of",
            "json",
        ])
        .arg(path)
        .kill_on_drop(true);

        let output = run_with_timeout(&mut cmd, &self.ffprobe_bin, FFPROBE_TIMEOUT)
            .await
            .map_err(|e| match e {
                e if e.is_missing_binary() => ProbeError::Unavailable(e.to_string()),
                e => ProbeError::Failed(e.to_string()),
            })?;

        if !output.status.success() {
            return Err(ProbeError::Failed(stderr_tail(&output.stderr)));
        }
        parse_probe(&output.stdout)
    }
}
