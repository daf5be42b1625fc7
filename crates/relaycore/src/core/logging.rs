//! Logging initialization and startup diagnostics
//!
//! The crate logs through the `log` facade; events are bridged into a
//! `tracing` subscriber so that per-request spans (user, platform) show up
//! next to every line.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::core::config::{LogFormat, RelayConfig};
use crate::download::platform::Platform;

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn,h2=warn";

/// Installs the global subscriber.
///
/// # Errors
/// Fails if a logger or subscriber is already installed.
pub fn init_logger(format: LogFormat) -> Result<()> {
    tracing_log::LogTracer::init().context("Failed to bridge the log facade")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    }
    .context("Failed to initialize logger")?;

    Ok(())
}

/// Logs the effective configuration and checks optional files.
pub fn log_startup_configuration(config: &RelayConfig) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Relay configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for line in config.to_string().lines() {
        log::info!("  {}", line);
    }

    match config.cookies_for(Platform::Instagram) {
        Some(path) => log::info!("✅ Instagram cookies: {}", path.display()),
        None => {
            log::warn!(
                "⚠️  Instagram cookies not found at {}",
                config.instagram_cookies.display()
            );
            log::warn!("   Reels that require login will fail");
        }
    }

    if config.owner_id == 0 {
        log::warn!("⚠️  OWNER_ID is not set, /stats is disabled");
    }
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_startup_report_without_logger() {
        let config = RelayConfig::default();
        log_startup_configuration(&config);
    }
}
