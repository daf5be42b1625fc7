//! relaycore - the engine behind relaybot.
//!
//! Takes a link to an X or Instagram post, fetches the video with yt-dlp,
//! re-encodes it with ffmpeg when it does not fit the transport limit, and
//! hands the result to a [`transport::Transport`]. Nothing in this crate
//! depends on Telegram types.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, admission gates, statistics
//! - `download`: link classification, format ladder, extractor backends, the
//!   acquisition engine and the per-request pipeline
//! - `conversion`: ffmpeg/ffprobe backends and size/aspect remediation
//! - `transport`: the seam to the messaging front-end

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod conversion;
pub mod core;
pub mod download;
pub mod transport;

// Re-export commonly used types for convenience
pub use crate::core::config::RelayConfig;
pub use crate::core::error::{RelayError, RelayResult};
pub use crate::core::types::{ChatRef, Identity, Inbound, MediaArtifact, Request};
pub use crate::download::pipeline::{Backends, Outcome, Relay};
pub use crate::download::platform::{classify, Platform};
pub use crate::transport::{StatusMessage, Transport, TransportError};
