//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod messages;
pub mod process;
pub mod rate_limiter;
pub mod stats;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::RelayConfig;
pub use error::RelayError;
pub use logging::{init_logger, log_startup_configuration};
