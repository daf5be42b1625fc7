//! Telegram implementation of the relay transport.

use async_trait::async_trait;
use relaycore::{ChatRef, MediaArtifact, StatusMessage, Transport, TransportError};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, MessageId, ReplyParameters};
use teloxide::RequestError;

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn transport_error(e: RequestError) -> TransportError {
    TransportError(e.to_string())
}

fn reply_to(chat: ChatRef) -> Option<ReplyParameters> {
    chat.reply_to.map(|id| ReplyParameters::new(MessageId(id)))
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat: ChatRef, text: &str) -> Result<StatusMessage, TransportError> {
        let mut request = self.bot.send_message(ChatId(chat.chat_id), text);
        if let Some(reply) = reply_to(chat) {
            request = request.reply_parameters(reply);
        }
        let sent = request.await.map_err(transport_error)?;
        Ok(StatusMessage {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0,
        })
    }

    async fn edit_text(&self, message: StatusMessage, text: &str) -> Result<(), TransportError> {
        self.bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .await
            .map_err(transport_error)?;
        Ok(())
    }

    async fn delete_message(&self, message: StatusMessage) -> Result<(), TransportError> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await
            .map_err(transport_error)?;
        Ok(())
    }

    async fn send_media(&self, chat: ChatRef, artifact: &MediaArtifact) -> Result<(), TransportError> {
        let chat_id = ChatId(chat.chat_id);
        let file = InputFile::file(&artifact.path);
        log::info!(
            "📤 Uploading {} ({} bytes, animated={})",
            artifact.path.display(),
            artifact.size,
            artifact.animated
        );

        if artifact.animated {
            let mut request = self.bot.send_animation(chat_id, file);
            if let Some(reply) = reply_to(chat) {
                request = request.reply_parameters(reply);
            }
            request.await.map_err(transport_error)?;
        } else {
            // Enable streaming support for better compatibility
            let mut request = self.bot.send_video(chat_id, file).supports_streaming(true);
            if let Some(reply) = reply_to(chat) {
                request = request.reply_parameters(reply);
            }
            request.await.map_err(transport_error)?;
        }
        Ok(())
    }
}
