//! ZPL Program Client
//!
//! Everything needed to talk to the two-way-peg and liquidity-management
//! programs:
//! - PDA derivation matching the programs' own seeds
//! - Account and instruction codecs
//! - Instruction builders with the programs' account ordering
//! - Bucket status resolution
//! - `ZplClient`, which fetches accounts and submits transactions through
//!   injected collaborators

pub mod accounts;
pub mod builder;
pub mod client;
pub mod discriminator;
pub mod instruction;
pub mod pda;
pub mod rpc;
pub mod status;

use solana_sdk::pubkey::Pubkey;

pub use accounts::{
    AccountCodec, HotReserveBucket, HotReserveBucketStatus, Position, TwoWayPegConfiguration,
    ZplAccount, BUCKET_SCRIPT_PATH_KEY_OFFSET, OWNER_OFFSET,
};
pub use builder::{AddWithdrawalRequestParams, CreateHotReserveBucketParams, ZplInstructionBuilder};
pub use client::{
    AccountFilter, AccountReader, ClientError, CreatedBucket, GuardianAccounts, KeyedAccount,
    KeypairWallet, TransactionSubmitter, WalletSigner, ZplClient,
};
pub use discriminator::{account_discriminator, AccountKind, DISCRIMINATOR_LEN};
pub use instruction::ZplInstruction;
pub use pda::{PdaError, ProgramAddressDeriver};
pub use rpc::RpcBackend;
pub use status::{resolve_bucket_status, select_bucket_for_guardian, BucketStatus};

/// Deployed program IDs and the zBTC mint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZplProgramIds {
    pub two_way_peg: Pubkey,
    pub liquidity_management: Pubkey,
    pub asset_mint: Pubkey,
}

// ============================================================================
// Errors
// ============================================================================

/// Account and instruction codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("{kind:?} account must be {expected} bytes, got {actual}")]
    LengthMismatch {
        kind: AccountKind,
        expected: usize,
        actual: usize,
    },

    #[error("discriminator does not match {kind:?}")]
    DiscriminatorMismatch { kind: AccountKind },

    #[error("account {0} has no data")]
    MissingData(Pubkey),

    #[error("invalid {kind:?} field: {reason}")]
    InvalidField { kind: AccountKind, reason: String },

    #[error("unknown account discriminator")]
    UnknownDiscriminator,

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("{field} value {value} overflows its encoding")]
    EncodingOverflow { field: &'static str, value: u64 },

    #[error("unknown instruction discriminator: {0}")]
    UnknownInstruction(u8),

    #[error("instruction {discriminator} must be {expected} bytes, got {actual}")]
    InstructionLength {
        discriminator: u8,
        expected: usize,
        actual: usize,
    },

    #[error("empty instruction data")]
    EmptyInstruction,
}

/// Instruction builder errors
#[derive(Debug, thiserror::Error)]
pub enum InstructionError {
    #[error("wallet not connected")]
    WalletNotConnected,

    #[error(transparent)]
    Pda(#[from] PdaError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("none of {found} buckets belongs to guardian setting {expected}")]
    GuardianSettingMismatch { expected: Pubkey, found: usize },
}
