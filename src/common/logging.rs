//! Structured Logging
//!
//! `tracing` subscriber setup plus JSON event records for the deposit,
//! bucket and liquidity flows.
//!
//! # Usage
//!
//! ```rust,ignore
//! use zbtc_bridge::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?; // JSON for log shipping
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::config::BridgeConfig;
use crate::zpl::BucketStatus;

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(LoggingError::InvalidLevel(other.to_string())),
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Deposit selection and PSBT construction
    Deposit,
    /// Bucket creation, reactivation and status checks
    Bucket,
    Withdrawal,
    /// Store / retrieve against a position
    Liquidity,
    /// Submissions to the Solana cluster
    Rpc,
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// RFC 3339
    pub timestamp: String,
    pub level: LogLevel,
    pub category: EventCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            serde_json::json!({ "error": "failed to serialize log", "message": self.message })
                .to_string()
        })
    }

    /// Emit through `tracing` at the event's level
    pub fn emit(&self) {
        let line = self.to_json();
        match self.level {
            LogLevel::Trace => tracing::trace!(target: "zbtc_bridge::event", "{}", line),
            LogLevel::Debug => tracing::debug!(target: "zbtc_bridge::event", "{}", line),
            LogLevel::Info => tracing::info!(target: "zbtc_bridge::event", "{}", line),
            LogLevel::Warn => tracing::warn!(target: "zbtc_bridge::event", "{}", line),
            LogLevel::Error => tracing::error!(target: "zbtc_bridge::event", "{}", line),
        }
    }
}

/// Record a built deposit
pub fn log_deposit_plan(
    txid: &str,
    destination: &str,
    amount_sats: u64,
    fee_sats: u64,
    inputs: usize,
    change_sats: Option<u64>,
) {
    LogEvent::new(LogLevel::Info, EventCategory::Deposit, "deposit_planned")
        .with_correlation_id(txid)
        .with_data(serde_json::json!({
            "destination": destination,
            "amount_sats": amount_sats,
            "fee_sats": fee_sats,
            "inputs": inputs,
            "change_sats": change_sats,
        }))
        .emit();
}

/// Record a bucket lifecycle event
pub fn log_bucket_event(event_type: &str, bucket: &str, status: Option<&BucketStatus>) {
    let (level, owner) = match status {
        Some(BucketStatus::WrongOwner { owner }) => (LogLevel::Warn, Some(owner.to_string())),
        _ => (LogLevel::Info, None),
    };
    LogEvent::new(level, EventCategory::Bucket, event_type)
        .with_correlation_id(bucket)
        .with_data(bucket_event_data(bucket, status.map(BucketStatus::as_str), owner))
        .emit();
}

fn bucket_event_data(
    bucket: &str,
    status: Option<&'static str>,
    owner: Option<String>,
) -> serde_json::Value {
    serde_json::json!({ "bucket": bucket, "status": status, "owner": owner })
}

/// Record a confirmed Solana transaction
pub fn log_submission(category: EventCategory, action: &str, signature: &str) {
    LogEvent::new(LogLevel::Info, category, action)
        .with_correlation_id(signature)
        .with_data(serde_json::json!({ "signature": signature }))
        .emit();
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the global subscriber
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zbtc_bridge={}", level.as_str())));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

pub fn init_from_config(config: &BridgeConfig) -> Result<(), LoggingError> {
    init_logging(config.log_level, config.log_json)
}

/// Short id tying together the log lines of one user action
pub fn generate_correlation_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u16 = bitcoin::secp256k1::rand::random();
    format!("{:x}-{:04x}", millis & 0xFFFF_FFFF, suffix)
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),

    #[error("invalid log level: {0}")]
    InvalidLevel(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(LogLevel::Warn, EventCategory::Bucket, "bucket_checked")
            .with_correlation_id("abc-1")
            .with_data(serde_json::json!({ "status": "expired" }));

        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["level"], "warn");
        assert_eq!(json["category"], "bucket");
        assert_eq!(json["correlation_id"], "abc-1");
        assert_eq!(json["data"]["status"], "expired");
    }

    #[test]
    fn test_optional_fields_are_skipped() {
        let json = LogEvent::new(LogLevel::Info, EventCategory::System, "start").to_json();
        assert!(!json.contains("correlation_id"));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn test_bucket_event_data() {
        let owner = Pubkey::new_unique();
        let status = BucketStatus::WrongOwner { owner };
        let data = bucket_event_data("bucket-1", Some(status.as_str()), Some(owner.to_string()));
        assert_eq!(data["status"], "wrong_owner");
        assert_eq!(data["owner"], owner.to_string());
        assert!(bucket_event_data("bucket-1", None, None)["status"].is_null());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_correlation_id_shape() {
        let id = generate_correlation_id();
        let (_, suffix) = id.split_once('-').unwrap();
        assert_eq!(suffix.len(), 4);
    }
}
