//! Process configuration.
//!
//! Read once at startup from the environment (a `.env` file is loaded by the
//! binary before this runs), validated, then shared as `Arc<RelayConfig>`.
//! Nothing here is re-read after startup.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::Env;
use figment::Figment;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::download::platform::Platform;

/// Defaults used when the environment does not say otherwise.
pub mod defaults {
    /// Telegram Bot API upload ceiling for bots (50 MiB)
    pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

    /// Concurrent acquisitions process-wide
    pub const MAX_PARALLEL_DOWNLOADS: usize = 3;

    /// Requests per user inside one window
    pub const RATE_LIMIT_REQUESTS: usize = 5;

    /// Sliding window length in seconds
    pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

    /// Per-attempt ffmpeg budget in seconds
    pub const FFMPEG_TIMEOUT_SECS: u64 = 180;

    /// Per-attempt yt-dlp budget in seconds
    pub const EXTRACT_TIMEOUT_SECS: u64 = 300;

    pub const DOWNLOAD_DIR: &str = "downloads";

    pub const INSTAGRAM_COOKIES: &str = "/app/cookies/instagram.txt";

    pub const YTDL_BIN: &str = "yt-dlp";
    pub const FFMPEG_BIN: &str = "ffmpeg";
    pub const FFPROBE_BIN: &str = "ffprobe";
}

/// Environment keys this crate understands (matched case-insensitively).
const ENV_KEYS: &[&str] = &[
    "telegram_bot_token",
    "bot_token",
    "teloxide_token",
    "owner_id",
    "download_dir",
    "max_file_size",
    "max_parallel_downloads",
    "rate_limit_requests",
    "rate_limit_window",
    "instagram_cookies",
    "normalize_x_aspect",
    "shrink_oversized",
    "ffmpeg_timeout_seconds",
    "extract_timeout_seconds",
    "gate_wait_seconds",
    "ytdl_bin",
    "ffmpeg_bin",
    "ffprobe_bin",
    "reply_unsupported",
    "log_format",
];

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Extract(Box<figment::Error>),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("bot token is not set (TELEGRAM_BOT_TOKEN)")]
    MissingToken,

    #[error("failed to prepare download directory: {0}")]
    DownloadDir(#[source] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Extract(Box::new(err))
    }
}

/// Sliding-window quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

/// External tool locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ytdl_bin: String,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ytdl_bin: defaults::YTDL_BIN.to_string(),
            ffmpeg_bin: defaults::FFMPEG_BIN.to_string(),
            ffprobe_bin: defaults::FFPROBE_BIN.to_string(),
        }
    }
}

/// Immutable process configuration.
#[derive(Debug)]
pub struct RelayConfig {
    /// Transport credential; only the bot binary requires it
    pub bot_token: Option<SecretString>,
    /// Identity allowed to run privileged commands (0 = nobody)
    pub owner_id: u64,
    pub download_dir: PathBuf,
    pub max_file_size: u64,
    pub max_parallel_downloads: usize,
    pub rate_limit: RateLimitConfig,
    /// Cookie file for Instagram, used only when it exists
    pub instagram_cookies: PathBuf,
    /// Re-encode X videos with non-square sample aspect ratio
    pub normalize_x_aspect: bool,
    /// Try to shrink a file that stayed oversized after the whole format ladder
    pub shrink_oversized: bool,
    pub ffmpeg_timeout: Duration,
    pub extract_timeout: Duration,
    /// Upper bound on waiting for a download slot; `None` waits forever
    pub gate_wait: Option<Duration>,
    pub tools: ToolPaths,
    /// Answer links to unsupported sites with a hint instead of ignoring them
    pub reply_unsupported: bool,
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            owner_id: 0,
            download_dir: PathBuf::from(defaults::DOWNLOAD_DIR),
            max_file_size: defaults::MAX_FILE_SIZE,
            max_parallel_downloads: defaults::MAX_PARALLEL_DOWNLOADS,
            rate_limit: RateLimitConfig {
                max_requests: defaults::RATE_LIMIT_REQUESTS,
                window: Duration::from_secs(defaults::RATE_LIMIT_WINDOW_SECS),
            },
            instagram_cookies: PathBuf::from(defaults::INSTAGRAM_COOKIES),
            normalize_x_aspect: true,
            shrink_oversized: true,
            ffmpeg_timeout: Duration::from_secs(defaults::FFMPEG_TIMEOUT_SECS),
            extract_timeout: Duration::from_secs(defaults::EXTRACT_TIMEOUT_SECS),
            gate_wait: None,
            tools: ToolPaths::default(),
            reply_unsupported: false,
            log_format: LogFormat::default(),
        }
    }
}

/// Flat view of the environment, one field per key.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct EnvConfig {
    telegram_bot_token: Option<String>,
    bot_token: Option<String>,
    teloxide_token: Option<String>,
    owner_id: u64,
    download_dir: PathBuf,
    max_file_size: u64,
    max_parallel_downloads: usize,
    rate_limit_requests: usize,
    rate_limit_window: u64,
    instagram_cookies: PathBuf,
    #[serde(deserialize_with = "deserialize_flag")]
    normalize_x_aspect: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    shrink_oversized: bool,
    ffmpeg_timeout_seconds: u64,
    extract_timeout_seconds: u64,
    gate_wait_seconds: u64,
    ytdl_bin: String,
    ffmpeg_bin: String,
    ffprobe_bin: String,
    #[serde(deserialize_with = "deserialize_flag")]
    reply_unsupported: bool,
    log_format: LogFormat,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: None,
            bot_token: None,
            teloxide_token: None,
            owner_id: 0,
            download_dir: PathBuf::from(defaults::DOWNLOAD_DIR),
            max_file_size: defaults::MAX_FILE_SIZE,
            max_parallel_downloads: defaults::MAX_PARALLEL_DOWNLOADS,
            rate_limit_requests: defaults::RATE_LIMIT_REQUESTS,
            rate_limit_window: defaults::RATE_LIMIT_WINDOW_SECS,
            instagram_cookies: PathBuf::from(defaults::INSTAGRAM_COOKIES),
            normalize_x_aspect: true,
            shrink_oversized: true,
            ffmpeg_timeout_seconds: defaults::FFMPEG_TIMEOUT_SECS,
            extract_timeout_seconds: defaults::EXTRACT_TIMEOUT_SECS,
            gate_wait_seconds: 0,
            ytdl_bin: defaults::YTDL_BIN.to_string(),
            ffmpeg_bin: defaults::FFMPEG_BIN.to_string(),
            ffprobe_bin: defaults::FFPROBE_BIN.to_string(),
            reply_unsupported: false,
            log_format: LogFormat::default(),
        }
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(value) => Ok(value != 0),
        Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("expected a flag, got `{}`", other))),
        },
    }
}

impl From<EnvConfig> for RelayConfig {
    fn from(env: EnvConfig) -> Self {
        let token = [env.telegram_bot_token, env.bot_token, env.teloxide_token]
            .into_iter()
            .flatten()
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty());

        Self {
            bot_token: token.map(SecretString::from),
            owner_id: env.owner_id,
            download_dir: env.download_dir,
            max_file_size: env.max_file_size,
            max_parallel_downloads: env.max_parallel_downloads,
            rate_limit: RateLimitConfig {
                max_requests: env.rate_limit_requests,
                window: Duration::from_secs(env.rate_limit_window),
            },
            instagram_cookies: env.instagram_cookies,
            normalize_x_aspect: env.normalize_x_aspect,
            shrink_oversized: env.shrink_oversized,
            ffmpeg_timeout: Duration::from_secs(env.ffmpeg_timeout_seconds),
            extract_timeout: Duration::from_secs(env.extract_timeout_seconds),
            gate_wait: (env.gate_wait_seconds > 0).then(|| Duration::from_secs(env.gate_wait_seconds)),
            tools: ToolPaths {
                ytdl_bin: env.ytdl_bin,
                ffmpeg_bin: env.ffmpeg_bin,
                ffprobe_bin: env.ffprobe_bin,
            },
            reply_unsupported: env.reply_unsupported,
            log_format: env.log_format,
        }
    }
}

impl RelayConfig {
    /// Loads and validates the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(Figment::new().merge(Env::raw().only(ENV_KEYS)))
    }

    /// Loads from an arbitrary figment (used by tests and `check-config`).
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let env: EnvConfig = figment.extract()?;
        let config = RelayConfig::from(env);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, ok: bool) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                })
            }
        }

        positive("MAX_FILE_SIZE", self.max_file_size > 0)?;
        positive("MAX_PARALLEL_DOWNLOADS", self.max_parallel_downloads > 0)?;
        positive("RATE_LIMIT_REQUESTS", self.rate_limit.max_requests > 0)?;
        positive("RATE_LIMIT_WINDOW", !self.rate_limit.window.is_zero())?;
        positive("FFMPEG_TIMEOUT_SECONDS", !self.ffmpeg_timeout.is_zero())?;
        positive("EXTRACT_TIMEOUT_SECONDS", !self.extract_timeout.is_zero())?;

        if self.download_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "DOWNLOAD_DIR",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The bot token, or an error if the binary was started without one.
    pub fn require_token(&self) -> Result<&SecretString, ConfigError> {
        self.bot_token.as_ref().ok_or(ConfigError::MissingToken)
    }

    /// Creates the download directory if it does not exist yet.
    pub fn ensure_download_dir(&self) -> Result<(), ConfigError> {
        fs_err::create_dir_all(&self.download_dir).map_err(ConfigError::DownloadDir)
    }

    /// Cookie file to pass to the extractor for `platform`, if one applies.
    pub fn cookies_for(&self, platform: Platform) -> Option<&Path> {
        cookie_file(platform, &self.instagram_cookies)
    }

    /// Whether `identity` may run owner-only commands.
    pub fn is_owner(&self, identity: u64) -> bool {
        self.owner_id != 0 && self.owner_id == identity
    }
}

/// The configured cookie file, if `platform` needs one and it exists on disk.
///
/// Checked per call so a cookie file dropped in after startup is picked up.
pub fn cookie_file(platform: Platform, instagram_cookies: &Path) -> Option<&Path> {
    (platform.needs_cookies() && instagram_cookies.is_file()).then_some(instagram_cookies)
}

impl fmt::Display for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bot_token: {}", if self.bot_token.is_some() { "<set>" } else { "<missing>" })?;
        writeln!(f, "owner_id: {}", self.owner_id)?;
        writeln!(f, "download_dir: {}", self.download_dir.display())?;
        writeln!(f, "max_file_size: {} bytes", self.max_file_size)?;
        writeln!(f, "max_parallel_downloads: {}", self.max_parallel_downloads)?;
        writeln!(
            f,
            "rate_limit: {} requests / {}s",
            self.rate_limit.max_requests,
            self.rate_limit.window.as_secs()
        )?;
        writeln!(f, "instagram_cookies: {}", self.instagram_cookies.display())?;
        writeln!(f, "normalize_x_aspect: {}", self.normalize_x_aspect)?;
        writeln!(f, "shrink_oversized: {}", self.shrink_oversized)?;
        writeln!(f, "ffmpeg_timeout: {}s", self.ffmpeg_timeout.as_secs())?;
        writeln!(f, "extract_timeout: {}s", self.extract_timeout.as_secs())?;
        match self.gate_wait {
            Some(wait) => writeln!(f, "gate_wait: {}s", wait.as_secs())?,
            None => writeln!(f, "gate_wait: unbounded")?,
        }
        writeln!(
            f,
            "tools: {} / {} / {}",
            self.tools.ytdl_bin, self.tools.ffmpeg_bin, self.tools.ffprobe_bin
        )?;
        write!(f, "reply_unsupported: {}", self.reply_unsupported)
    }
}
