//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command menu registration

use std::time::Duration;

use reqwest::ClientBuilder;
use secrecy::{ExposeSecret, SecretString};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

/// HTTP timeout for Bot API calls. Uploads of 50 MB files need headroom.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Я умею:")]
pub enum Command {
    #[command(description = "как пользоваться ботом")]
    Start,
    #[command(description = "как пользоваться ботом")]
    Help,
    #[command(description = "статистика (только для владельца)")]
    Stats,
}

/// Creates a Bot instance with a long-timeout HTTP client
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to build the HTTP client
pub fn create_bot(token: &SecretString) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Bot::with_client(token.expose_secret(), client))
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "как пользоваться ботом"),
        BotCommand::new("help", "как пользоваться ботом"),
    ])
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/start", "relaybot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/stats", "relaybot").unwrap(), Command::Stats);
        assert_eq!(Command::parse("/help@relaybot", "relaybot").unwrap(), Command::Help);
        assert!(Command::parse("/download", "relaybot").is_err());
        assert!(Command::parse("https://x.com/a/status/1", "relaybot").is_err());
    }
}
