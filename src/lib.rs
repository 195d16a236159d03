//! zBTC Bridge Client Core
//!
//! Moves BTC into a user's hot reserve bucket and drives the two-way-peg and
//! liquidity-management programs on Solana.
//!
//! ## Bitcoin Side
//!
//! 1. **Taproot buckets** - key path for the guardian, timelocked script path for the user
//! 2. **Deposits** - greedy UTXO selection and an unsigned PSBT for the user's wallet
//!
//! ## Solana Side
//!
//! - PDA derivation and account/instruction codecs
//! - Instruction builders in on-chain account order
//! - Bucket status resolution
//! - `ZplClient` over injectable RPC and wallet collaborators
//!
//! Derivation, selection and encoding are pure. The only I/O is through the
//! collaborator traits in [`deposit`] and [`zpl::client`].

pub mod common;
pub mod deposit;
pub mod keys;
pub mod taproot;
pub mod units;
pub mod zpl;

// Re-exports: ambient stack
pub use common::{BridgeConfig, BridgeError, ErrorCategory, Result};

// Re-exports: keys
pub use keys::{
    derive_bitcoin_wallet, parse_x_only_pubkey, wallet_derivation_message,
    x_only_from_wallet_pubkey_hex, BitcoinNetwork, DerivedBitcoinWallet, KeyError,
};

// Re-exports: Taproot
pub use taproot::{
    derive_bucket_address, derive_wallet_address, tweaked_key_from_address, BucketAddress,
    TaprootError, WalletKeyType, DEFAULT_UNLOCK_BLOCK_HEIGHT,
};

// Re-exports: deposits
pub use deposit::{
    build_deposit, estimate_max_spendable, select_utxos, DepositError, DepositPlan,
    DepositTxBuilder, PsbtSigner, TransactionBroadcaster, Utxo,
};

// Re-exports: ZPL
pub use zpl::{
    resolve_bucket_status, BucketStatus, ClientError, HotReserveBucket, ProgramAddressDeriver,
    RpcBackend, ZplClient, ZplInstructionBuilder, ZplProgramIds,
};
