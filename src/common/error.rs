//! Common Error Types
//!
//! `BridgeError` wraps every component error and classifies it for callers.

use thiserror::Error;

use super::config::ConfigError;
use super::logging::LoggingError;
use crate::deposit::DepositError;
use crate::keys::KeyError;
use crate::taproot::TaprootError;
use crate::units::UnitsError;
use crate::zpl::{ClientError, CodecError, InstructionError, PdaError, StatusError};

/// How a caller should react to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any work was done
    InputValidation,
    /// Not enough funds or spendable outputs
    ResourceInsufficiency,
    /// Wallet, bucket or guardian state does not allow the action
    StatePrecondition,
    /// Account or transaction bytes did not decode
    MalformedData,
    /// Failure reported by the RPC node, signer or broadcaster
    External,
}

/// Root error type
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("taproot error: {0}")]
    Taproot(#[from] TaprootError),

    #[error("deposit error: {0}")]
    Deposit(#[from] DepositError),

    #[error("PDA error: {0}")]
    Pda(#[from] PdaError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("instruction error: {0}")]
    Instruction(#[from] InstructionError),

    #[error("bucket status error: {0}")]
    Status(#[from] StatusError),

    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("units error: {0}")]
    Units(#[from] UnitsError),
}

impl BridgeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::Config(_) | BridgeError::Units(_) | BridgeError::Key(_) => {
                ErrorCategory::InputValidation
            }
            BridgeError::Logging(LoggingError::InvalidLevel(_)) => ErrorCategory::InputValidation,
            BridgeError::Logging(LoggingError::InitFailed(_)) => ErrorCategory::External,
            BridgeError::Taproot(_) => ErrorCategory::InputValidation,
            BridgeError::Deposit(e) => deposit_category(e),
            BridgeError::Pda(_) => ErrorCategory::InputValidation,
            BridgeError::Codec(e) => codec_category(e),
            BridgeError::Instruction(e) => instruction_category(e),
            BridgeError::Status(_) => ErrorCategory::StatePrecondition,
            BridgeError::Client(e) => client_category(e),
        }
    }

    /// Only collaborator I/O is worth retrying, and only by the caller
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::External
    }

    /// Stable code for UI and API mapping
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "CONFIG_ERROR",
            BridgeError::Logging(_) => "LOGGING_ERROR",
            BridgeError::Key(KeyError::UnsupportedNetwork(_)) => "UNSUPPORTED_NETWORK",
            BridgeError::Key(_) => "INVALID_KEY",
            BridgeError::Taproot(TaprootError::AddressDerivation(_)) => "ADDRESS_DERIVATION",
            BridgeError::Taproot(TaprootError::Key(KeyError::UnsupportedNetwork(_))) => {
                "UNSUPPORTED_NETWORK"
            }
            BridgeError::Taproot(TaprootError::InvalidLockTime(_)) => "INVALID_LOCK_TIME",
            BridgeError::Taproot(_) => "INVALID_ADDRESS",
            BridgeError::Deposit(e) => deposit_code(e),
            BridgeError::Pda(PdaError::InvalidSeed { .. }) => "INVALID_SEED",
            BridgeError::Pda(_) => "PDA_ERROR",
            BridgeError::Codec(e) => codec_code(e),
            BridgeError::Instruction(InstructionError::WalletNotConnected) => {
                "WALLET_NOT_CONNECTED"
            }
            BridgeError::Instruction(InstructionError::Pda(PdaError::InvalidSeed { .. })) => {
                "INVALID_SEED"
            }
            BridgeError::Instruction(InstructionError::Pda(_)) => "PDA_ERROR",
            BridgeError::Instruction(InstructionError::Codec(e)) => codec_code(e),
            BridgeError::Status(StatusError::GuardianSettingMismatch { .. }) => {
                "GUARDIAN_SETTING_MISMATCH"
            }
            BridgeError::Client(e) => client_code(e),
            BridgeError::Units(_) => "INVALID_AMOUNT",
        }
    }
}

fn deposit_category(e: &DepositError) -> ErrorCategory {
    match e {
        DepositError::NoUtxos
        | DepositError::NoSpendableUtxos { .. }
        | DepositError::InsufficientFunds { .. }
        | DepositError::InsufficientFundsForFee { .. } => ErrorCategory::ResourceInsufficiency,
        DepositError::InvalidFeeRate(_)
        | DepositError::InvalidAddress(_)
        | DepositError::InvalidTxid(_) => ErrorCategory::InputValidation,
        DepositError::Psbt(_) | DepositError::SignedPsbtMismatch | DepositError::Extraction(_) => {
            ErrorCategory::MalformedData
        }
        DepositError::Signing(_) | DepositError::Broadcast(_) => ErrorCategory::External,
    }
}

fn deposit_code(e: &DepositError) -> &'static str {
    match e {
        DepositError::NoUtxos => "NO_UTXOS",
        DepositError::NoSpendableUtxos { .. } => "NO_SPENDABLE_UTXOS",
        DepositError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
        DepositError::InsufficientFundsForFee { .. } => "INSUFFICIENT_FUNDS_FOR_FEE",
        DepositError::InvalidFeeRate(_) => "INVALID_FEE_RATE",
        DepositError::InvalidAddress(_) => "INVALID_ADDRESS",
        DepositError::InvalidTxid(_) => "INVALID_TXID",
        DepositError::Psbt(_) | DepositError::SignedPsbtMismatch => "INVALID_PSBT",
        DepositError::Extraction(_) => "EXTRACTION_FAILED",
        DepositError::Signing(_) => "SIGNING_FAILED",
        DepositError::Broadcast(_) => "BROADCAST_FAILED",
    }
}

fn codec_category(e: &CodecError) -> ErrorCategory {
    match e {
        CodecError::EncodingOverflow { .. } => ErrorCategory::InputValidation,
        _ => ErrorCategory::MalformedData,
    }
}

fn codec_code(e: &CodecError) -> &'static str {
    match e {
        CodecError::EncodingOverflow { .. } => "ENCODING_OVERFLOW",
        CodecError::LengthMismatch { .. }
        | CodecError::DiscriminatorMismatch { .. }
        | CodecError::MissingData(_)
        | CodecError::InvalidField { .. }
        | CodecError::UnknownDiscriminator => "MALFORMED_ACCOUNT",
        CodecError::Serialization(_) => "SERIALIZATION_FAILED",
        CodecError::UnknownInstruction(_)
        | CodecError::InstructionLength { .. }
        | CodecError::EmptyInstruction => "MALFORMED_INSTRUCTION",
    }
}

fn instruction_category(e: &InstructionError) -> ErrorCategory {
    match e {
        InstructionError::WalletNotConnected => ErrorCategory::StatePrecondition,
        InstructionError::Pda(_) => ErrorCategory::InputValidation,
        InstructionError::Codec(e) => codec_category(e),
    }
}

fn client_category(e: &ClientError) -> ErrorCategory {
    match e {
        ClientError::WalletNotConnected
        | ClientError::ConfigurationNotFound
        | ClientError::BucketNotFound
        | ClientError::Status(_) => ErrorCategory::StatePrecondition,
        ClientError::Rpc(_) | ClientError::Signing(_) => ErrorCategory::External,
        ClientError::MessageCompile(_) => ErrorCategory::MalformedData,
        ClientError::Codec(e) => codec_category(e),
        ClientError::Instruction(e) => instruction_category(e),
        ClientError::Taproot(_) | ClientError::Pda(_) => ErrorCategory::InputValidation,
    }
}

fn client_code(e: &ClientError) -> &'static str {
    match e {
        ClientError::WalletNotConnected => "WALLET_NOT_CONNECTED",
        ClientError::ConfigurationNotFound => "CONFIGURATION_NOT_FOUND",
        ClientError::BucketNotFound => "BUCKET_NOT_FOUND",
        ClientError::Status(_) => "GUARDIAN_SETTING_MISMATCH",
        ClientError::Rpc(_) => "RPC_ERROR",
        ClientError::Signing(_) => "SIGNING_FAILED",
        ClientError::MessageCompile(_) => "MESSAGE_COMPILE_FAILED",
        ClientError::Codec(e) => codec_code(e),
        ClientError::Instruction(InstructionError::WalletNotConnected) => "WALLET_NOT_CONNECTED",
        ClientError::Instruction(InstructionError::Codec(e)) => codec_code(e),
        ClientError::Instruction(InstructionError::Pda(_)) | ClientError::Pda(_) => "PDA_ERROR",
        ClientError::Taproot(TaprootError::AddressDerivation(_)) => "ADDRESS_DERIVATION",
        ClientError::Taproot(_) => "INVALID_ADDRESS",
    }
}

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zpl::AccountKind;
    use solana_sdk::pubkey::Pubkey;

    #[test]
    fn test_resource_errors() {
        let err: BridgeError = DepositError::InsufficientFunds {
            required: 10,
            available: 5,
        }
        .into();
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
        assert_eq!(err.category(), ErrorCategory::ResourceInsufficiency);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("need 10 sats"));
    }

    #[test]
    fn test_malformed_account() {
        let err: BridgeError = CodecError::DiscriminatorMismatch {
            kind: AccountKind::Position,
        }
        .into();
        assert_eq!(err.error_code(), "MALFORMED_ACCOUNT");
        assert_eq!(err.category(), ErrorCategory::MalformedData);

        let overflow: BridgeError = CodecError::EncodingOverflow {
            field: "validity_period",
            value: u64::MAX,
        }
        .into();
        assert_eq!(overflow.category(), ErrorCategory::InputValidation);
    }

    #[test]
    fn test_wallet_not_connected_is_precondition() {
        let from_builder: BridgeError = InstructionError::WalletNotConnected.into();
        let from_client: BridgeError = ClientError::WalletNotConnected.into();
        for err in [from_builder, from_client] {
            assert_eq!(err.error_code(), "WALLET_NOT_CONNECTED");
            assert_eq!(err.category(), ErrorCategory::StatePrecondition);
        }
    }

    #[test]
    fn test_guardian_mismatch() {
        let err: BridgeError = StatusError::GuardianSettingMismatch {
            expected: Pubkey::new_unique(),
            found: 2,
        }
        .into();
        assert_eq!(err.error_code(), "GUARDIAN_SETTING_MISMATCH");
        assert_eq!(err.category(), ErrorCategory::StatePrecondition);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(BridgeError::from(ClientError::Rpc("timeout".into())).is_retryable());
        assert!(BridgeError::from(DepositError::Broadcast("rejected".into())).is_retryable());
        assert!(!BridgeError::from(PdaError::TooManySeeds(17)).is_retryable());
    }

    #[test]
    fn test_network_error_code() {
        let err: BridgeError = KeyError::UnsupportedNetwork("signet".into()).into();
        assert_eq!(err.error_code(), "UNSUPPORTED_NETWORK");
        assert_eq!(err.category(), ErrorCategory::InputValidation);
    }
}
