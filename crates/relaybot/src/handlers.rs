//! Update routing: commands first, then every other text message goes to the relay.

use std::sync::Arc;

use indoc::formatdoc;
use relaycore::core::messages;
use relaycore::core::stats::StatsSnapshot;
use relaycore::{ChatRef, Identity, Inbound, Relay};
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

use crate::bot::Command;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub relay: Arc<Relay>,
}

impl HandlerDeps {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay }
    }
}

/// Creates the main dispatcher schema
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(command_handler(deps.clone()))
        .branch(message_handler(deps))
}

/// Handler for /start, /help and /stats
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start | Command::Help => {
                        let text = messages::welcome(deps.relay.config().max_file_size);
                        bot.send_message(msg.chat.id, text).await?;
                    }
                    Command::Stats => {
                        let user_id = msg.from.as_ref().map(|u| u.id.0).unwrap_or(0);
                        if deps.relay.config().is_owner(user_id) {
                            bot.send_message(msg.chat.id, render_stats(&deps.relay.stats())).await?;
                        } else {
                            log::info!("Ignoring /stats from non-owner {}", user_id);
                        }
                    }
                }
                Ok(())
            }
        },
    ))
}

/// Handler for plain text: every message is a potential link
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_map(|msg: Message| inbound_from(&msg))
        .endpoint(move |inbound: Inbound| {
            let relay = deps.relay.clone();
            async move {
                // Long-running; the dispatcher must keep serving this chat meanwhile
                tokio::spawn(async move {
                    let outcome = relay.handle(inbound).await;
                    log::debug!("Request finished: {:?}", outcome);
                });
                Ok(())
            }
        })
}

/// Text message from a user, or `None` for service messages, media and
/// anonymous senders.
fn inbound_from(msg: &Message) -> Option<Inbound> {
    let text = msg.text()?;
    let user = msg.from.as_ref()?;
    Some(Inbound {
        identity: Identity(user.id.0),
        chat: ChatRef::new(msg.chat.id.0).replying_to(msg.id.0),
        text: text.to_string(),
    })
}

/// Owner-facing summary of the counters.
pub fn render_stats(stats: &StatsSnapshot) -> String {
    formatdoc! {"
        Статистика:

        Всего запросов: {total}
        Instagram: {instagram}
        X (Twitter): {x}
        Ошибок: {errors}
        Пользователей: {users}",
        total = stats.total,
        instagram = stats.instagram,
        x = stats.x,
        errors = stats.errors,
        users = stats.users,
    }
}
