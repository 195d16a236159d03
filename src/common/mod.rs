//! Common Infrastructure Module
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - The root error type

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{default_solana_rpc, BridgeConfig, ConfigError, DEFAULT_BUCKET_VALIDITY_PERIOD};
pub use error::{BridgeError, ErrorCategory, Result};
pub use logging::{
    generate_correlation_id, init_from_config, init_logging, log_bucket_event, log_deposit_plan,
    log_submission, EventCategory, LogEvent, LogLevel, LoggingError,
};
