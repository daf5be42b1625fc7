//! Re-encoding backends and the remediation ladder.
//!
//! Two jobs end up here:
//! - aspect fix: X videos whose sample aspect ratio is not square
//! - size fix: a file that is still above the ceiling after the format ladder
//!
//! Both go through [`remediation::Remediator`], which walks a list of
//! [`profiles::EncodeProfile`]s and talks to the toolchain only through the
//! [`Encoder`] and [`Prober`] traits.

pub mod ffmpeg;
pub mod profiles;
pub mod remediation;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// How the encoder should produce the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeMode {
    /// Stream copy, only the container/bitstream aspect flag is rewritten
    Remux,
    /// Full H.264/AAC re-encode with a filter graph and a CRF value
    Transcode { filter: String, crf: u8 },
}

#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: EncodeMode,
    pub timeout: Duration,
}

/// Errors that can occur during encoding
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("encoder not available: {0}")]
    Unavailable(String),

    #[error("encoder timed out after {0}s")]
    TimedOut(u64),

    #[error("FFmpeg error: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ProbeError {
    /// Probe binary missing; callers skip whatever needed the probe
    #[error("probe tool not available: {0}")]
    Unavailable(String),

    #[error("probe failed: {0}")]
    Failed(String),
}

/// What the prober learned about the first video stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// As printed by ffprobe, e.g. `"1:1"`, `"4:3"`, `"N/A"`
    pub sample_aspect_ratio: Option<String>,
    pub has_audio: bool,
}

impl StreamInfo {
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

/// Whether a sample aspect ratio value calls for the aspect fix.
///
/// Missing, `N/A`, square and degenerate (`0:1`, `x:0`) values do not.
pub fn sar_needs_fix(sar: Option<&str>) -> bool {
    let Some(sar) = sar.map(str::trim) else {
        return false;
    };
    if sar.is_empty() || sar.eq_ignore_ascii_case("n/a") {
        return false;
    }
    let Some((num, den)) = sar.split_once([':', '/']) else {
        return false;
    };
    match (num.trim().parse::<u32>(), den.trim().parse::<u32>()) {
        (Ok(num), Ok(den)) => num != 0 && den != 0 && num != den,
        _ => false,
    }
}

/// Re-encodes a file.
#[async_trait]
pub trait Encoder: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the backing tool is installed. Callers skip optional
    /// re-encodes when it is not.
    async fn available(&self) -> bool {
        true
    }

    /// Produces `job.output`. On any error, including timeout, no output file
    /// is left behind.
    async fn encode(&self, job: &EncodeJob) -> Result<(), EncodeError>;
}

/// Reads stream parameters.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<StreamInfo, ProbeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sar_values_that_skip_the_fix() {
        for value in [None, Some(""), Some("N/A"), Some("1:1"), Some("0:1"), Some("4:0"), Some("junk")] {
            assert!(!sar_needs_fix(value), "{:?}", value);
        }
    }

    #[test]
    fn test_sar_values_that_need_the_fix() {
        assert!(sar_needs_fix(Some("4:3")));
        assert!(sar_needs_fix(Some("40:33")));
        assert!(sar_needs_fix(Some("1/2")));
    }

    #[test]
    fn test_dimensions_require_both_sides() {
        let info = StreamInfo {
            width: Some(1280),
            height: None,
            ..StreamInfo::default()
        };
        assert_eq!(info.dimensions(), None);
    }
}
