//! Deposit Construction
//!
//! Moves BTC from the user's wallet into their hot reserve bucket.
//!
//! # Flow
//!
//! ```text
//!  wallet UTXOs ──► select_utxos ──► DepositTxBuilder ──► unsigned PSBT
//!                                                            │
//!                     PsbtSigner (external wallet) ◄─────────┘
//!                            │
//!                            ▼
//!         DepositPlan::extract_signed (fee-rate guard) ──► TransactionBroadcaster
//! ```
//!
//! Selection and building are pure. Signing and broadcasting are collaborator
//! traits implemented outside this crate.

pub mod builder;
pub mod selector;

use async_trait::async_trait;
use bitcoin::{psbt::Psbt, Transaction, Txid};
use tracing::info;

pub use builder::{build_deposit, DepositPlan, DepositTxBuilder};
pub use selector::{
    estimate_max_spendable, select_utxos, Selection, Utxo, DUST_THRESHOLD_SATS, TX_BASE_VBYTES,
    TX_INPUT_VBYTES, TX_OUTPUT_VBYTES,
};

/// External wallet capability that signs deposit PSBTs
#[async_trait]
pub trait PsbtSigner: Send + Sync {
    /// Sign and finalize every input
    async fn sign_psbt(&self, psbt: Psbt) -> Result<Psbt, DepositError>;
}

/// External broadcaster for finalized transactions
#[async_trait]
pub trait TransactionBroadcaster: Send + Sync {
    async fn broadcast(&self, tx: &Transaction) -> Result<Txid, DepositError>;
}

/// Hand a plan to the signer, enforce the fee guard and broadcast
pub async fn sign_and_broadcast(
    plan: &DepositPlan,
    signer: &dyn PsbtSigner,
    broadcaster: &dyn TransactionBroadcaster,
) -> Result<Txid, DepositError> {
    let signed = signer.sign_psbt(plan.psbt.clone()).await?;
    let tx = plan.extract_signed(signed)?;
    let txid = broadcaster.broadcast(&tx).await?;

    info!(
        txid = %txid,
        amount_sats = plan.amount_to_send,
        fee_sats = plan.fee_paid(),
        "Deposit broadcast"
    );

    Ok(txid)
}

/// Deposit errors
#[derive(Debug, thiserror::Error)]
pub enum DepositError {
    #[error("no UTXOs provided")]
    NoUtxos,

    #[error("none of {count} UTXOs is worth spending at {fee_rate} sat/vB")]
    NoSpendableUtxos { count: usize, fee_rate: u64 },

    #[error("insufficient funds: need {required} sats, have {available} sats")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("insufficient funds for fee: need {required} sats, selected {available} sats")]
    InsufficientFundsForFee { required: u64, available: u64 },

    #[error("invalid fee rate: {0} sat/vB")]
    InvalidFeeRate(u64),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid txid: {0}")]
    InvalidTxid(String),

    #[error("psbt error: {0}")]
    Psbt(String),

    #[error("signed psbt does not match the built transaction")]
    SignedPsbtMismatch,

    #[error("failed to extract signed transaction: {0}")]
    Extraction(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("broadcast failed: {0}")]
    Broadcast(String),
}
