//! Request-scoped value types shared by the pipeline and the transport.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;
use url::Url;

use crate::download::platform::Platform;

/// Opaque requester identity (the Telegram user id in the bot front-end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identity(pub u64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Identity {
    fn from(id: u64) -> Self {
        Identity(id)
    }
}

/// Where replies for a request go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatRef {
    pub chat_id: i64,
    /// Message the replies should reference, if any
    pub reply_to: Option<i32>,
}

impl ChatRef {
    pub fn new(chat_id: i64) -> Self {
        Self { chat_id, reply_to: None }
    }

    pub fn replying_to(mut self, message_id: i32) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// Raw text message handed over by the transport.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub identity: Identity,
    pub chat: ChatRef,
    pub text: String,
}

/// A classified request. Lives until the reply has been sent.
#[derive(Debug, Clone)]
pub struct Request {
    pub identity: Identity,
    pub chat: ChatRef,
    pub url: Url,
    pub platform: Platform,
    pub received_at: SystemTime,
}

/// The file accepted for delivery.
///
/// The pipeline owns the file from the moment the acquisition engine returns
/// it and removes it on every exit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub size: u64,
    /// Video without an audio track, delivered as an animation
    pub animated: bool,
    pub platform: Platform,
}
