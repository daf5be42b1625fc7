//! Per-request orchestration.
//!
//! classify -> rate limit -> status -> acquire (inside the gate) -> deliver
//! -> cleanup. Every request ends with exactly one reply: the video, or a
//! single message describing what went wrong.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::SystemTime;

use futures_util::FutureExt;
use tracing::Instrument;

use crate::conversion::ffmpeg::FfmpegToolchain;
use crate::conversion::{Encoder, Prober};
use crate::core::config::RelayConfig;
use crate::core::error::RelayError;
use crate::core::gate::DownloadGate;
use crate::core::messages;
use crate::core::rate_limiter::{Admission, RateLimiter};
use crate::core::stats::{RelayStats, StatsSnapshot};
use crate::core::types::{ChatRef, Inbound, Request};
use crate::core::utils::TempFileGuard;
use crate::download::engine::{AcquisitionEngine, EngineSettings};
use crate::download::platform::{parse_link, Platform};
use crate::download::source::ytdlp::YtDlpExtractor;
use crate::download::source::Extractor;
use crate::transport::{StatusMessage, Transport};

/// External tools the relay drives.
#[derive(Clone)]
pub struct Backends {
    pub extractor: Arc<dyn Extractor>,
    pub encoder: Arc<dyn Encoder>,
    pub prober: Arc<dyn Prober>,
}

impl Backends {
    /// yt-dlp + ffmpeg/ffprobe from the configured paths.
    pub fn system(config: &RelayConfig) -> Self {
        let toolchain = Arc::new(FfmpegToolchain::new(&config.tools));
        Self {
            extractor: Arc::new(YtDlpExtractor::new(config.tools.ytdl_bin.clone())),
            encoder: toolchain.clone(),
            prober: toolchain,
        }
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not a supported link
    Ignored,
    RateLimited { retry_after_secs: u64 },
    Delivered { platform: Platform, size: u64 },
    Failed { kind: &'static str },
}

pub struct Relay {
    config: Arc<RelayConfig>,
    limiter: RateLimiter,
    gate: DownloadGate,
    engine: AcquisitionEngine,
    stats: RelayStats,
    transport: Arc<dyn Transport>,
}

impl Relay {
    pub fn new(config: Arc<RelayConfig>, backends: Backends, transport: Arc<dyn Transport>) -> Self {
        let engine = AcquisitionEngine::new(
            backends.extractor,
            backends.encoder,
            backends.prober,
            EngineSettings::from_config(&config),
        );
        Self {
            limiter: RateLimiter::new(config.rate_limit),
            gate: DownloadGate::new(config.max_parallel_downloads, config.gate_wait),
            engine,
            stats: RelayStats::new(),
            transport,
            config,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn gate(&self) -> &DownloadGate {
        &self.gate
    }

    /// Handles one inbound text message end to end.
    pub async fn handle(&self, inbound: Inbound) -> Outcome {
        let Some((url, platform)) = parse_link(&inbound.text) else {
            if self.config.reply_unsupported && !inbound.text.trim_start().starts_with('/') {
                self.notify(inbound.chat, messages::UNSUPPORTED_HINT).await;
            }
            return Outcome::Ignored;
        };

        let request = Request {
            identity: inbound.identity,
            chat: inbound.chat,
            url,
            platform,
            received_at: SystemTime::now(),
        };
        let span = tracing::info_span!("request", user = %request.identity, platform = %platform);

        self.process(&request).instrument(span).await
    }

    async fn process(&self, request: &Request) -> Outcome {
        if let Admission::Denied { retry_after_secs } = self.limiter.check(request.identity) {
            log::info!("Rate limited, retry in {}s", retry_after_secs);
            self.notify(request.chat, &messages::rate_limited(retry_after_secs)).await;
            return Outcome::RateLimited { retry_after_secs };
        }

        log::info!("Accepted {}", request.url);
        let status = match self.transport.send_text(request.chat, messages::DOWNLOADING).await {
            Ok(status) => Some(status),
            Err(e) => {
                log::warn!("Failed to send status message: {}", e);
                None
            }
        };

        let result = match AssertUnwindSafe(self.acquire_and_deliver(request, status))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(RelayError::Unexpected(panic_detail(panic.as_ref()))),
        };

        match result {
            Ok(size) => {
                self.stats.record_success(request.identity, request.platform);
                log::info!("Sent {} bytes", size);
                if let Some(status) = status {
                    if let Err(e) = self.transport.delete_message(status).await {
                        log::warn!("Failed to delete status message: {}", e);
                    }
                }
                Outcome::Delivered {
                    platform: request.platform,
                    size,
                }
            }
            Err(error) => {
                if error.counts_as_error() {
                    self.stats.record_error();
                }
                if error.is_unexpected() {
                    log::error!("Unexpected error: {:?}", error);
                } else {
                    log::info!("User-facing error: {}", error);
                }
                self.report(request.chat, status, &error.user_message()).await;
                Outcome::Failed { kind: error.kind() }
            }
        }
    }

    async fn acquire_and_deliver(&self, request: &Request, status: Option<StatusMessage>) -> Result<u64, RelayError> {
        let artifact = {
            let _permit = self.gate.acquire().await?;
            self.engine
                .acquire(&request.url, request.identity, request.platform)
                .await?
        };
        let mut guard = TempFileGuard::new(&artifact.path);

        let size = fs_err::tokio::metadata(guard.path()).await?.len();
        if size > self.config.max_file_size {
            return Err(RelayError::Oversize {
                limit: self.config.max_file_size,
            });
        }

        if let Some(status) = status {
            if let Err(e) = self.transport.edit_text(status, messages::SENDING).await {
                log::warn!("Failed to edit status message: {}", e);
            }
        }

        self.transport
            .send_media(request.chat, &artifact)
            .await
            .map_err(|e| RelayError::Delivery(e.to_string()))?;
        guard.remove();
        Ok(size)
    }

    /// Puts the error text into the status message, or sends it fresh.
    async fn report(&self, chat: ChatRef, status: Option<StatusMessage>, text: &str) {
        if let Some(status) = status {
            match self.transport.edit_text(status, text).await {
                Ok(()) => return,
                Err(e) => log::warn!("Failed to edit status message: {}", e),
            }
        }
        self.notify(chat, text).await;
    }

    /// Best-effort text reply.
    async fn notify(&self, chat: ChatRef, text: &str) {
        if let Err(e) = self.transport.send_text(chat, text).await {
            log::warn!("Failed to send reply: {}", e);
        }
    }
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
