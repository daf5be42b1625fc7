//! relaybot - Telegram front-end for relaycore.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relaycore::core::logging::{init_logger, log_startup_configuration};
use relaycore::{Backends, Relay, RelayConfig};
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

mod bot;
mod cli;
mod handlers;
mod transport;

use bot::{create_bot, setup_bot_commands};
use cli::{Cli, Commands};
use handlers::{schema, HandlerDeps};
use transport::TelegramTransport;

/// How often idle rate-limit windows are dropped
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // .env is optional
    let _ = dotenvy::dotenv();

    let config = RelayConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Some(Commands::CheckConfig) => {
            println!("{}", config);
            if config.bot_token.is_none() {
                anyhow::bail!("TELEGRAM_BOT_TOKEN is not set");
            }
            Ok(())
        }
        Some(Commands::Run) | None => run_bot(config).await,
    }
}

async fn run_bot(config: RelayConfig) -> Result<()> {
    init_logger(config.log_format)?;
    log::info!("🚀 Starting relaybot {}", env!("CARGO_PKG_VERSION"));

    config
        .ensure_download_dir()
        .context("Failed to create download directory")?;
    log_startup_configuration(&config);

    let bot = create_bot(config.require_token()?)?;

    match bot.get_me().await {
        Ok(me) => log::info!("✅ Authorized as @{}", me.username()),
        Err(e) => log::warn!("Failed to fetch bot info: {}", e),
    }

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let backends = Backends::system(&config);
    let relay = Arc::new(Relay::new(
        Arc::new(config),
        backends,
        Arc::new(TelegramTransport::new(bot.clone())),
    ));

    spawn_limiter_sweep(relay.clone());

    let handler = schema(HandlerDeps::new(relay));

    // Create polling listener that drops pending updates on start
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    log::info!("👂 Listening for updates");
    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

/// Periodically forgets users whose rate-limit window has emptied.
fn spawn_limiter_sweep(relay: Arc<Relay>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = relay.limiter().sweep();
            if removed > 0 {
                log::debug!("Rate limiter sweep dropped {} idle users", removed);
            }
        }
    });
}
