//! Link classification and video acquisition

pub mod engine;
pub mod ladder;
pub mod pipeline;
pub mod platform;
pub mod source;
pub mod ytdlp_errors;

// Re-exports for convenience
pub use engine::{AcquisitionEngine, EngineSettings};
pub use pipeline::{Backends, Outcome, Relay};
pub use platform::{classify, parse_link, Platform};
