//! YtDlpExtractor: the production extraction backend.
//!
//! Runs one yt-dlp process per attempt on the blocking pool. yt-dlp prints a
//! small JSON object after the file has been moved into place; when that
//! line is missing we fall back to scanning the download directory for the
//! attempt's stem.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::process::{wait_with_output_timeout, ProcessError};
use crate::core::utils::files_with_prefix;
use crate::download::source::{ExtractError, ExtractJob, Extracted, Extractor};
use crate::download::ytdlp_errors::classify_stderr;

/// Fields yt-dlp prints once the final file is in place
const PRINT_TEMPLATE: &str = "after_move:%(.{filepath,filesize,filesize_approx,duration,acodec,width,height})j";

/// Suffixes of yt-dlp intermediates that are never the final file
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

pub struct YtDlpExtractor {
    bin: String,
}

impl YtDlpExtractor {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Command-line arguments for one attempt (without the binary).
    pub fn build_args(job: &ExtractJob) -> Vec<String> {
        let template = format!("{}.%(ext)s", job.output_stem.display());
        let mut args: Vec<String> = vec![
            "-f".into(),
            job.selector.clone(),
            "-o".into(),
            template,
            "--merge-output-format".into(),
            "mp4".into(),
            "--user-agent".into(),
            job.user_agent.clone(),
            "--no-progress".into(),
            "--no-simulate".into(),
            "--print".into(),
            PRINT_TEMPLATE.into(),
        ];
        if job.single_item {
            args.push("--no-playlist".into());
        }
        if let Some(cookies) = &job.cookies {
            args.push("--cookies".into());
            args.push(cookies.display().to_string());
        }
        args.push("--".into());
        args.push(job.url.to_string());
        args
    }
}

#[derive(Debug, Default, Deserialize)]
struct PrintedInfo {
    filepath: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    duration: Option<f64>,
    acodec: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Reads the last JSON line yt-dlp printed.
fn parse_printed(stdout: &str) -> Option<PrintedInfo> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str(line).ok())
}

/// Finished file for `stem` in its directory, skipping partial downloads.
fn find_output(stem: &Path) -> Option<PathBuf> {
    let dir = stem.parent()?;
    let prefix = stem.file_name()?.to_str()?;
    files_with_prefix(dir, prefix).into_iter().find(|path| {
        let name = path.to_string_lossy();
        !PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
    })
}

fn to_extracted(info: PrintedInfo, stem: &Path) -> Option<Extracted> {
    let path = info
        .filepath
        .map(PathBuf::from)
        .filter(|p| p.is_file())
        .or_else(|| find_output(stem))?;

    let has_audio = info.acodec.as_deref().map(|codec| !codec.is_empty() && codec != "none");
    Some(Extracted {
        path,
        declared_size: info.filesize.or(info.filesize_approx).map(|s| s as u64),
        duration_secs: info.duration,
        has_audio,
        width: info.width,
        height: info.height,
    })
}

fn map_process_error(err: ProcessError) -> ExtractError {
    match err {
        ProcessError::TimedOut { timeout, .. } => ExtractError::Timeout(timeout.as_secs()),
        e if e.is_missing_binary() => ExtractError::Spawn(e.to_string()),
        e => ExtractError::Failed(e.to_string()),
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract(&self, job: &ExtractJob) -> Result<Extracted, ExtractError> {
        let bin = self.bin.clone();
        let args = Self::build_args(job);
        let timeout = job.timeout;
        let stem = job.output_stem.clone();

        log::debug!("Running {} {}", bin, args.join(" "));

        let handle = tokio::task::spawn_blocking(move || {
            let child = Command::new(&bin)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| ProcessError::spawn(&bin, e))?;
            wait_with_output_timeout(child, &bin, timeout)
        });

        let output = handle
            .await
            .map_err(|e| ExtractError::Failed(format!("extractor task failed: {}", e)))?
            .map_err(map_process_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("yt-dlp exited with {}: {}", output.status, stderr.trim());
            return Err(classify_stderr(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info = parse_printed(&stdout).unwrap_or_default();
        to_extracted(info, &stem)
            .ok_or_else(|| ExtractError::Failed("yt-dlp finished but produced no file".to_string()))
    }
}
