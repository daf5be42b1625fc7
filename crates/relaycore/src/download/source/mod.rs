//! Extraction backend abstraction.
//!
//! The engine only knows the [`Extractor`] trait. The production backend is
//! [`ytdlp::YtDlpExtractor`]; tests plug in scripted fakes.

pub mod ytdlp;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// User agent sent to both platforms
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                      (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Parameters for one extraction attempt.
#[derive(Debug, Clone)]
pub struct ExtractJob {
    pub url: Url,
    /// Output path without extension; the backend appends the real one
    pub output_stem: PathBuf,
    /// yt-dlp format expression
    pub selector: String,
    pub cookies: Option<PathBuf>,
    pub user_agent: String,
    /// Never expand playlists or carousels
    pub single_item: bool,
    pub timeout: Duration,
}

/// What a successful attempt left on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub path: PathBuf,
    /// Size reported by the site before download, if any
    pub declared_size: Option<u64>,
    pub duration_secs: Option<f64>,
    /// `Some(false)` when the backend reported no audio codec
    pub has_audio: Option<bool>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// Private account, login wall or age gate
    #[error("content is private: {0}")]
    Private(String),

    /// Post deleted or never existed
    #[error("content unavailable: {0}")]
    Unavailable(String),

    /// The post exists but carries no video
    #[error("no video in post: {0}")]
    NoVideo(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("extractor timed out after {0}s")]
    Timeout(u64),

    /// Backend binary missing or not executable
    #[error("extractor could not start: {0}")]
    Spawn(String),

    #[error("extraction failed: {0}")]
    Failed(String),
}

impl ExtractError {
    /// Short label for logs and metrics-style grouping.
    pub fn subcategory(&self) -> &'static str {
        match self {
            ExtractError::Private(_) => "private",
            ExtractError::Unavailable(_) => "unavailable",
            ExtractError::NoVideo(_) => "no_video",
            ExtractError::Network(_) => "network",
            ExtractError::Timeout(_) => "timeout",
            ExtractError::Spawn(_) => "spawn",
            ExtractError::Failed(_) => "extract_failed",
        }
    }
}

/// A backend that turns a URL into a media file on disk.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human-readable name of this backend (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Runs one attempt. On error the backend may leave partial files behind;
    /// the caller removes everything matching `output_stem`.
    async fn extract(&self, job: &ExtractJob) -> Result<Extracted, ExtractError>;
}
