//! Environment-based Configuration
//!
//! Everything network- or deployment-specific lives in one `BridgeConfig`
//! value that is passed into the client and builders.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ZBTC_TWO_WAY_PEG_PROGRAM_ID` - Two-way-peg program
//! - `ZBTC_LIQUIDITY_MANAGEMENT_PROGRAM_ID` - Liquidity-management program
//! - `ZBTC_ASSET_MINT` - zBTC mint
//! - `ZBTC_GUARDIAN_SETTING` - Guardian setting the user's buckets belong to
//!
//! ## Optional
//! - `ZBTC_BITCOIN_NETWORK` - "mainnet", "testnet" or "regtest" (default: "testnet")
//! - `ZBTC_SOLANA_RPC` - Solana RPC endpoint (default per network)
//! - `ZBTC_UNLOCK_BLOCK_HEIGHT` - Bucket relative lock in blocks (default: 4320)
//! - `ZBTC_BUCKET_VALIDITY_PERIOD` - Bucket validity in seconds (default: 30 days)
//! - `ZBTC_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! - `ZBTC_LOG_JSON` - "1" or "true" for JSON log lines

use std::env;
use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use super::logging::LogLevel;
use crate::keys::BitcoinNetwork;
use crate::taproot::{DEFAULT_UNLOCK_BLOCK_HEIGHT, MAX_RELATIVE_LOCK_BLOCKS};
use crate::zpl::ZplProgramIds;

/// 30 days in seconds
pub const DEFAULT_BUCKET_VALIDITY_PERIOD: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Default Solana RPC for a Bitcoin network's deployment
pub fn default_solana_rpc(network: BitcoinNetwork) -> &'static str {
    match network {
        BitcoinNetwork::Mainnet => "https://api.mainnet-beta.solana.com",
        BitcoinNetwork::Testnet => "https://api.devnet.solana.com",
        BitcoinNetwork::Regtest => "http://127.0.0.1:8899",
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub bitcoin_network: BitcoinNetwork,

    /// Solana RPC endpoint
    pub solana_rpc: String,

    pub program_ids: ZplProgramIds,

    /// Guardian setting the user's buckets are opened under
    pub guardian_setting: Pubkey,

    /// Relative lock of the bucket's script path, in blocks
    pub unlock_block_height: u32,

    /// Seconds a bucket stays active after creation or reactivation
    pub bucket_validity_period: u64,

    pub log_level: LogLevel,

    pub log_json: bool,
}

impl BridgeConfig {
    /// Config with defaults for everything but the deployment accounts
    pub fn new(
        bitcoin_network: BitcoinNetwork,
        program_ids: ZplProgramIds,
        guardian_setting: Pubkey,
    ) -> Self {
        Self {
            bitcoin_network,
            solana_rpc: default_solana_rpc(bitcoin_network).to_string(),
            program_ids,
            guardian_setting,
            unlock_block_height: DEFAULT_UNLOCK_BLOCK_HEIGHT,
            bucket_validity_period: DEFAULT_BUCKET_VALIDITY_PERIOD,
            log_level: LogLevel::Info,
            log_json: false,
        }
    }

    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        // a missing .env file is fine
        dotenv::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bitcoin_network: BitcoinNetwork = lookup("ZBTC_BITCOIN_NETWORK")
            .unwrap_or_else(|| "testnet".to_string())
            .parse()
            .map_err(|e: crate::keys::KeyError| {
                ConfigError::InvalidValue("ZBTC_BITCOIN_NETWORK".to_string(), e.to_string())
            })?;

        let program_ids = ZplProgramIds {
            two_way_peg: required_pubkey(&lookup, "ZBTC_TWO_WAY_PEG_PROGRAM_ID")?,
            liquidity_management: required_pubkey(&lookup, "ZBTC_LIQUIDITY_MANAGEMENT_PROGRAM_ID")?,
            asset_mint: required_pubkey(&lookup, "ZBTC_ASSET_MINT")?,
        };
        let guardian_setting = required_pubkey(&lookup, "ZBTC_GUARDIAN_SETTING")?;

        let mut config = Self::new(bitcoin_network, program_ids, guardian_setting);

        if let Some(rpc) = lookup("ZBTC_SOLANA_RPC") {
            config.solana_rpc = rpc;
        }

        if let Some(height) = optional_parse::<u32, _>(&lookup, "ZBTC_UNLOCK_BLOCK_HEIGHT")? {
            if height == 0 || height > MAX_RELATIVE_LOCK_BLOCKS {
                return Err(ConfigError::InvalidValue(
                    "ZBTC_UNLOCK_BLOCK_HEIGHT".to_string(),
                    format!("{} is outside 1..={}", height, MAX_RELATIVE_LOCK_BLOCKS),
                ));
            }
            config.unlock_block_height = height;
        }

        if let Some(period) = optional_parse::<u64, _>(&lookup, "ZBTC_BUCKET_VALIDITY_PERIOD")? {
            // stored on-chain as u32
            if u32::try_from(period).is_err() {
                return Err(ConfigError::InvalidValue(
                    "ZBTC_BUCKET_VALIDITY_PERIOD".to_string(),
                    format!("{} does not fit in 32 bits", period),
                ));
            }
            config.bucket_validity_period = period;
        }

        if let Some(level) = lookup("ZBTC_LOG_LEVEL") {
            config.log_level = level
                .parse()
                .map_err(|e: super::logging::LoggingError| {
                    ConfigError::InvalidValue("ZBTC_LOG_LEVEL".to_string(), e.to_string())
                })?;
        }

        config.log_json = lookup("ZBTC_LOG_JSON")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(config)
    }

    /// Configuration summary for startup logs
    pub fn log_summary(&self) {
        tracing::info!(
            network = %self.bitcoin_network,
            solana_rpc = %self.solana_rpc,
            two_way_peg = %self.program_ids.two_way_peg,
            liquidity_management = %self.program_ids.liquidity_management,
            guardian_setting = %self.guardian_setting,
            unlock_block_height = self.unlock_block_height,
            "Bridge configuration loaded"
        );
    }
}

fn required_pubkey<F>(lookup: &F, var_name: &str) -> Result<Pubkey, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(var_name).ok_or_else(|| ConfigError::MissingEnvVar(var_name.to_string()))?;
    Pubkey::from_str(value.trim())
        .map_err(|e| ConfigError::InvalidValue(var_name.to_string(), e.to_string()))
}

fn optional_parse<T, F>(lookup: &F, var_name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(var_name)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue(var_name.to_string(), e.to_string()))
        })
        .transpose()
}
