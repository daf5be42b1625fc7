//! Seam between the relay and the messaging front-end.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::{ChatRef, MediaArtifact};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Handle of a sent status message that can be edited or deleted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Outbound operations the relay needs.
///
/// Status calls are treated as best effort by the caller; only
/// [`send_media`](Transport::send_media) failures change the outcome of a
/// request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, chat: ChatRef, text: &str) -> Result<StatusMessage, TransportError>;

    async fn edit_text(&self, message: StatusMessage, text: &str) -> Result<(), TransportError>;

    async fn delete_message(&self, message: StatusMessage) -> Result<(), TransportError>;

    /// Uploads the artifact as a video, or as an animation when it has no
    /// audio track.
    async fn send_media(&self, chat: ChatRef, artifact: &MediaArtifact) -> Result<(), TransportError>;
}
