//! Acquisition engine.
//!
//! Walks the format ladder until one attempt produces a file under the size
//! ceiling. At most one attempt's output exists on disk at any time: a
//! rejected file is removed before the next attempt starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use url::Url;
use uuid::Uuid;

use crate::conversion::profiles::{aspect_profiles, shrink_profiles};
use crate::conversion::remediation::Remediator;
use crate::conversion::{sar_needs_fix, Encoder, ProbeError, Prober, StreamInfo};
use crate::core::config::{cookie_file, RelayConfig};
use crate::core::error::RelayError;
use crate::core::types::{Identity, MediaArtifact};
use crate::core::utils::{remove_with_prefix, TempFileGuard};
use crate::download::ladder::{format_ladder, FormatStep};
use crate::download::platform::Platform;
use crate::download::source::{ExtractError, ExtractJob, Extracted, Extractor, BROWSER_USER_AGENT};

/// The parts of [`RelayConfig`] the engine needs.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub download_dir: PathBuf,
    pub max_file_size: u64,
    pub extract_timeout: Duration,
    pub encode_timeout: Duration,
    pub instagram_cookies: PathBuf,
    pub normalize_x_aspect: bool,
    pub shrink_oversized: bool,
}

impl EngineSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            download_dir: config.download_dir.clone(),
            max_file_size: config.max_file_size,
            extract_timeout: config.extract_timeout,
            encode_timeout: config.ffmpeg_timeout,
            instagram_cookies: config.instagram_cookies.clone(),
            normalize_x_aspect: config.normalize_x_aspect,
            shrink_oversized: config.shrink_oversized,
        }
    }
}

/// Why an attempt was rejected.
#[derive(Debug)]
pub enum AttemptOutcome {
    Oversize,
    Failed(ExtractError),
}

/// One rung of the ladder, as it actually went.
#[derive(Debug)]
pub struct AttemptRecord {
    /// 1-based, matches the `_a{n}` part of the file name
    pub index: usize,
    pub step: &'static str,
    pub size: Option<u64>,
    pub outcome: AttemptOutcome,
}

/// Picks the single terminal error after the ladder ran out.
fn terminal_error(attempts: Vec<AttemptRecord>, limit: u64) -> RelayError {
    if attempts.iter().any(|a| matches!(a.outcome, AttemptOutcome::Oversize)) {
        return RelayError::Oversize { limit };
    }
    attempts
        .into_iter()
        .rev()
        .find_map(|a| match a.outcome {
            AttemptOutcome::Failed(e) => Some(RelayError::Extraction(e)),
            _ => None,
        })
        .unwrap_or(RelayError::AcquisitionFailed)
}

pub struct AcquisitionEngine {
    extractor: Arc<dyn Extractor>,
    prober: Arc<dyn Prober>,
    remediator: Remediator,
    settings: EngineSettings,
    ladder: Vec<FormatStep>,
}

impl AcquisitionEngine {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        encoder: Arc<dyn Encoder>,
        prober: Arc<dyn Prober>,
        settings: EngineSettings,
    ) -> Self {
        let remediator = Remediator::new(encoder, settings.max_file_size, settings.encode_timeout);
        let ladder = format_ladder(settings.max_file_size);
        Self {
            extractor,
            prober,
            remediator,
            settings,
            ladder,
        }
    }

    pub fn ladder(&self) -> &[FormatStep] {
        &self.ladder
    }

    /// Fetches `url` into the download directory.
    ///
    /// On success the returned file belongs to the caller. On error nothing
    /// created by this call is left on disk.
    pub async fn acquire(&self, url: &Url, identity: Identity, platform: Platform) -> Result<MediaArtifact, RelayError> {
        let token = Uuid::new_v4().simple().to_string();
        let last = self.ladder.len();
        let mut attempts: Vec<AttemptRecord> = Vec::with_capacity(last);

        log::info!("Download start platform={} url={}", platform, url);

        for (offset, step) in self.ladder.iter().enumerate() {
            let index = offset + 1;
            let stem = self
                .settings
                .download_dir
                .join(format!("video_{}_{}_a{}", identity, token, index));
            let job = ExtractJob {
                url: url.clone(),
                output_stem: stem.clone(),
                selector: step.selector.clone(),
                cookies: cookie_file(platform, &self.settings.instagram_cookies).map(Path::to_path_buf),
                user_agent: BROWSER_USER_AGENT.to_string(),
                single_item: true,
                timeout: self.settings.extract_timeout,
            };

            let extracted = match self.extractor.extract(&job).await {
                Ok(extracted) => extracted,
                Err(e) => {
                    log::info!("Attempt {} ({}) failed: {}", index, step.label, e);
                    remove_with_prefix(&stem);
                    attempts.push(AttemptRecord {
                        index,
                        step: step.label,
                        size: None,
                        outcome: AttemptOutcome::Failed(e),
                    });
                    continue;
                }
            };

            let mut guard = TempFileGuard::new(&extracted.path);
            let size = match fs_err::tokio::metadata(guard.path()).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    log::warn!("Attempt {} output is unreadable: {}", index, e);
                    guard.remove();
                    remove_with_prefix(&stem);
                    attempts.push(AttemptRecord {
                        index,
                        step: step.label,
                        size: None,
                        outcome: AttemptOutcome::Failed(ExtractError::Failed(e.to_string())),
                    });
                    continue;
                }
            };
            log::info!(
                "Attempt {} ({}) downloaded {:.1} MB",
                index,
                step.label,
                size as f64 / 1024.0 / 1024.0
            );

            if size <= self.settings.max_file_size {
                return self.accept(guard, &extracted, size, platform).await;
            }

            attempts.push(AttemptRecord {
                index,
                step: step.label,
                size: Some(size),
                outcome: AttemptOutcome::Oversize,
            });

            if index == last && self.settings.shrink_oversized {
                return self.shrink(guard, &extracted, platform).await;
            }
            guard.remove();
            remove_with_prefix(&stem);
        }

        for attempt in &attempts {
            log::debug!(
                "Attempt {} ({}) size={:?}: {:?}",
                attempt.index,
                attempt.step,
                attempt.size,
                attempt.outcome
            );
        }
        let error = terminal_error(attempts, self.settings.max_file_size);
        log::info!("All attempts failed: {}", error);
        Err(error)
    }

    /// Applies the aspect fix where it is due and hands the file over.
    async fn accept(
        &self,
        mut guard: TempFileGuard,
        extracted: &Extracted,
        size: u64,
        platform: Platform,
    ) -> Result<MediaArtifact, RelayError> {
        let wants_aspect_fix = platform.supports_aspect_fix() && self.settings.normalize_x_aspect;
        let info = if wants_aspect_fix || extracted.has_audio.is_none() {
            self.probe(guard.path()).await
        } else {
            None
        };
        // yt-dlp's acodec wins; the probe only fills the gap
        let animated = match extracted.has_audio {
            Some(has_audio) => !has_audio,
            None => info.as_ref().is_some_and(|i| !i.has_audio),
        };

        let needs_fix = wants_aspect_fix
            && info
                .as_ref()
                .is_some_and(|i| sar_needs_fix(i.sample_aspect_ratio.as_deref()));
        if needs_fix {
            if self.remediator.encoder_available().await {
                log::info!("Sample aspect ratio needs a fix");
                let fixed = self
                    .remediator
                    .remediate(guard.path(), info.as_ref().and_then(|i| i.dimensions()), &aspect_profiles())
                    .await?;
                guard.remove();
                return Ok(MediaArtifact {
                    path: fixed.path,
                    size: fixed.size,
                    animated,
                    platform,
                });
            }
            log::warn!("Encoder not available, sending without aspect fix");
        }

        Ok(MediaArtifact {
            path: guard.keep(),
            size,
            animated,
            platform,
        })
    }

    /// Stream info, or `None` when the prober is missing or fails.
    async fn probe(&self, path: &Path) -> Option<StreamInfo> {
        match self.prober.probe(path).await {
            Ok(info) => Some(info),
            Err(ProbeError::Unavailable(tool)) => {
                log::warn!("{} not found, skip stream checks", tool);
                None
            }
            Err(e) => {
                log::warn!("Skip stream checks: {}", e);
                None
            }
        }
    }

    /// Last-resort re-encode of the final oversized attempt.
    async fn shrink(
        &self,
        mut guard: TempFileGuard,
        extracted: &Extracted,
        platform: Platform,
    ) -> Result<MediaArtifact, RelayError> {
        let source = match (extracted.width, extracted.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => self.prober.probe(guard.path()).await.ok().and_then(|i| i.dimensions()),
        };

        match self.remediator.remediate(guard.path(), source, &shrink_profiles()).await {
            Ok(fixed) => {
                guard.remove();
                Ok(MediaArtifact {
                    path: fixed.path,
                    size: fixed.size,
                    animated: extracted.has_audio == Some(false),
                    platform,
                })
            }
            Err(e) => {
                log::info!("Shrinking failed: {}", e);
                Err(RelayError::Oversize {
                    limit: self.settings.max_file_size,
                })
            }
        }
    }
}
