//! Bounded re-encoding ladder.
//!
//! Tries each profile in order, keeps the first output under the size
//! ceiling and deletes every other output before moving on. The input file
//! is left alone; the caller owns it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::conversion::profiles::EncodeProfile;
use crate::conversion::{EncodeError, EncodeJob, Encoder};
use crate::core::error::RelayError;
use crate::core::utils::TempFileGuard;

/// Accepted remediation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediated {
    pub path: PathBuf,
    pub size: u64,
    pub profile: &'static str,
}

pub struct Remediator {
    encoder: Arc<dyn Encoder>,
    max_file_size: u64,
    timeout: Duration,
}

/// `video_1_tok_a2.mp4` + `_norm720` -> `video_1_tok_a2_norm720.mp4`
pub fn output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    input.with_file_name(format!("{}{}.mp4", stem, suffix))
}

impl Remediator {
    pub fn new(encoder: Arc<dyn Encoder>, max_file_size: u64, timeout: Duration) -> Self {
        Self {
            encoder,
            max_file_size,
            timeout,
        }
    }

    pub async fn encoder_available(&self) -> bool {
        self.encoder.available().await
    }

    /// Runs `profiles` against `input`.
    ///
    /// Fails with [`RelayError::Oversize`] if at least one profile produced a
    /// file that was still too large, otherwise with
    /// [`RelayError::Remediation`] carrying the last encoder error.
    pub async fn remediate(
        &self,
        input: &Path,
        source: Option<(u32, u32)>,
        profiles: &[EncodeProfile],
    ) -> Result<Remediated, RelayError> {
        let mut oversize_seen = false;
        let mut last_error: Option<EncodeError> = None;

        for profile in profiles {
            let output = output_path(input, profile.suffix);
            let mut guard = TempFileGuard::new(&output);
            let job = EncodeJob {
                input: input.to_path_buf(),
                output,
                mode: profile.encode_mode(source),
                timeout: self.timeout,
            };

            log::info!("Re-encoding {} with profile {}", input.display(), profile.name);
            if let Err(e) = self.encoder.encode(&job).await {
                log::warn!("Profile {} failed: {}", profile.name, e);
                last_error = Some(e);
                continue;
            }

            let size = match fs_err::tokio::metadata(guard.path()).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    last_error = Some(EncodeError::Io(e));
                    continue;
                }
            };

            if size <= self.max_file_size {
                log::info!("Profile {} produced {} bytes, accepted", profile.name, size);
                return Ok(Remediated {
                    path: guard.keep(),
                    size,
                    profile: profile.name,
                });
            }

            log::info!("Profile {} produced {} bytes, still too large", profile.name, size);
            oversize_seen = true;
            guard.remove();
        }

        if oversize_seen {
            Err(RelayError::Oversize {
                limit: self.max_file_size,
            })
        } else {
            Err(RelayError::Remediation(
                last_error.map_or_else(|| "no encoding profiles".to_string(), |e| e.to_string()),
            ))
        }
    }
}
