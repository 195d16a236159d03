//! ZPL Client
//!
//! Account queries and the bucket, withdrawal and liquidity actions.
//! Network access goes through the `AccountReader` and
//! `TransactionSubmitter` traits; signing goes through `WalletSigner`.
//!
//! # Submission
//!
//! ```text
//! instructions ──► latest blockhash ──► v0 message
//!              ──► wallet signature ──► submit + confirm
//! ```
//!
//! Nothing is retried here. A failed fetch or submission is returned as-is.

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::XOnlyPublicKey;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use tracing::{debug, info, warn};

use super::accounts::{
    AccountCodec, HotReserveBucket, Position, TwoWayPegConfiguration,
    BUCKET_SCRIPT_PATH_KEY_OFFSET, OWNER_OFFSET,
};
use super::builder::{
    AddWithdrawalRequestParams, CreateHotReserveBucketParams, ZplInstructionBuilder,
};
use super::discriminator::AccountKind;
use super::pda::PdaError;
use super::status::{resolve_bucket_status, select_bucket_for_guardian, BucketStatus};
use super::{CodecError, InstructionError, StatusError};
use crate::common::config::BridgeConfig;
use crate::common::logging::{log_bucket_event, log_submission, EventCategory};
use crate::taproot::{derive_bucket_address, tweaked_key_from_address, BucketAddress, TaprootError};

// ============================================================================
// Collaborators
// ============================================================================

/// Byte-range equality filter applied server-side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFilter {
    pub offset: usize,
    pub bytes: Vec<u8>,
}

impl AccountFilter {
    /// Match accounts of `kind` by their leading discriminator
    pub fn discriminator(kind: AccountKind) -> Self {
        Self::memcmp(0, kind.discriminator())
    }

    pub fn memcmp(offset: usize, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            bytes: bytes.into(),
        }
    }

    /// Local evaluation, same semantics as the RPC node
    pub fn matches(&self, data: &[u8]) -> bool {
        data.get(self.offset..self.offset + self.bytes.len())
            .is_some_and(|window| window == self.bytes.as_slice())
    }
}

/// Raw account returned by a program query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedAccount {
    pub address: Pubkey,
    pub data: Vec<u8>,
}

/// Program account reads
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountReader: Send + Sync {
    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<AccountFilter>,
    ) -> Result<Vec<KeyedAccount>, ClientError>;
}

/// Blockhash lookup and transaction submission
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash, ClientError>;

    /// Send and wait for confirmation
    async fn submit_and_confirm(&self, tx: &VersionedTransaction)
        -> Result<Signature, ClientError>;
}

/// The connected Solana wallet
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    async fn sign_message(&self, message: VersionedMessage)
        -> Result<VersionedTransaction, ClientError>;
}

/// Wallet backed by a local keypair
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_message(
        &self,
        message: VersionedMessage,
    ) -> Result<VersionedTransaction, ClientError> {
        VersionedTransaction::try_new(message, &[&self.keypair])
            .map_err(|e| ClientError::Signing(e.to_string()))
    }
}

// ============================================================================
// Client
// ============================================================================

/// Guardian-side accounts needed to open a bucket
#[derive(Debug, Clone)]
pub struct GuardianAccounts {
    pub guardian_certificate: Pubkey,
    pub cold_reserve_bucket: Pubkey,
    /// Guardian hot-reserve key, the bucket's key-path key
    pub hot_reserve_public_key: XOnlyPublicKey,
}

/// Result of a confirmed bucket creation
#[derive(Debug, Clone)]
pub struct CreatedBucket {
    pub signature: Signature,
    /// Bucket account
    pub bucket: Pubkey,
    /// Bitcoin deposit address of the bucket
    pub address: BucketAddress,
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

pub struct ZplClient {
    config: BridgeConfig,
    builder: ZplInstructionBuilder,
    reader: Arc<dyn AccountReader>,
    submitter: Arc<dyn TransactionSubmitter>,
    wallet: Option<Arc<dyn WalletSigner>>,
}

impl ZplClient {
    pub fn new(
        config: BridgeConfig,
        reader: Arc<dyn AccountReader>,
        submitter: Arc<dyn TransactionSubmitter>,
    ) -> Self {
        Self {
            builder: ZplInstructionBuilder::new(config.program_ids, None),
            config,
            reader,
            submitter,
            wallet: None,
        }
    }

    pub fn with_wallet(mut self, wallet: Arc<dyn WalletSigner>) -> Self {
        self.set_wallet(Some(wallet));
        self
    }

    pub fn set_wallet(&mut self, wallet: Option<Arc<dyn WalletSigner>>) {
        self.builder.set_wallet(wallet.as_ref().map(|w| w.pubkey()));
        self.wallet = wallet;
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn builder(&self) -> &ZplInstructionBuilder {
        &self.builder
    }

    fn require_wallet(&self) -> Result<&Arc<dyn WalletSigner>, ClientError> {
        self.wallet.as_ref().ok_or(ClientError::WalletNotConnected)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    async fn fetch<T: AccountCodec>(
        &self,
        program_id: &Pubkey,
        mut filters: Vec<AccountFilter>,
    ) -> Result<Vec<T>, ClientError> {
        filters.insert(0, AccountFilter::discriminator(T::KIND));
        let accounts = self.reader.get_program_accounts(program_id, filters).await?;

        debug!(kind = ?T::KIND, count = accounts.len(), "Fetched program accounts");

        accounts
            .into_iter()
            .map(|account| T::decode(account.address, &account.data).map_err(ClientError::from))
            .collect()
    }

    /// Two-way-peg configuration singleton
    pub async fn get_two_way_peg_configuration(
        &self,
    ) -> Result<TwoWayPegConfiguration, ClientError> {
        self.fetch::<TwoWayPegConfiguration>(&self.config.program_ids.two_way_peg, vec![])
            .await?
            .into_iter()
            .next()
            .ok_or(ClientError::ConfigurationNotFound)
    }

    /// Buckets whose script-path key is `x_only`
    pub async fn get_hot_reserve_buckets_by_bitcoin_key(
        &self,
        x_only: &XOnlyPublicKey,
    ) -> Result<Vec<HotReserveBucket>, ClientError> {
        let filter = AccountFilter::memcmp(BUCKET_SCRIPT_PATH_KEY_OFFSET, x_only.serialize());
        self.fetch(&self.config.program_ids.two_way_peg, vec![filter])
            .await
    }

    pub async fn get_hot_reserve_buckets_by_owner(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<HotReserveBucket>, ClientError> {
        let filter = AccountFilter::memcmp(OWNER_OFFSET, owner.to_bytes());
        self.fetch(&self.config.program_ids.two_way_peg, vec![filter])
            .await
    }

    pub async fn get_positions_by_wallet(
        &self,
        wallet: &Pubkey,
    ) -> Result<Vec<Position>, ClientError> {
        let filter = AccountFilter::memcmp(OWNER_OFFSET, wallet.to_bytes());
        self.fetch(&self.config.program_ids.liquidity_management, vec![filter])
            .await
    }

    /// The caller's bucket under the configured guardian setting
    async fn find_own_bucket(
        &self,
        user_key: &XOnlyPublicKey,
    ) -> Result<Option<HotReserveBucket>, ClientError> {
        let buckets = self.get_hot_reserve_buckets_by_bitcoin_key(user_key).await?;
        Ok(select_bucket_for_guardian(&buckets, &self.config.guardian_setting)?.cloned())
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Status of the connected wallet's bucket for `user_key` at `now`
    pub async fn check_hot_reserve_bucket_status(
        &self,
        user_key: &XOnlyPublicKey,
        now: u64,
    ) -> Result<BucketStatus, ClientError> {
        let caller = self.require_wallet()?.pubkey();
        let bucket = self.find_own_bucket(user_key).await?;
        let status = resolve_bucket_status(bucket.as_ref(), &caller, now);

        let label = bucket
            .as_ref()
            .map(|b| b.public_key.to_string())
            .unwrap_or_else(|| user_key.to_string());
        log_bucket_event("bucket_status_checked", &label, Some(&status));

        Ok(status)
    }

    pub async fn create_hot_reserve_bucket(
        &self,
        guardian: &GuardianAccounts,
        user_key: &XOnlyPublicKey,
    ) -> Result<CreatedBucket, ClientError> {
        self.require_wallet()?;
        let configuration = self.get_two_way_peg_configuration().await?;

        let address = derive_bucket_address(
            &guardian.hot_reserve_public_key,
            user_key,
            self.config.unlock_block_height,
            self.config.bitcoin_network,
        )?;

        let params = CreateHotReserveBucketParams {
            hot_reserve_x_only_public_key: address.tweaked_pubkey.serialize(),
            script_path_spend_public_key: user_key.serialize(),
            lock_time: u64::from(self.config.unlock_block_height),
            validity_period: self.config.bucket_validity_period,
            guardian_setting: self.config.guardian_setting,
            guardian_certificate: guardian.guardian_certificate,
            cold_reserve_bucket: guardian.cold_reserve_bucket,
            layer_fee_collector: configuration.layer_fee_collector,
        };
        let instruction = self.builder.create_hot_reserve_bucket(&params)?;
        let (bucket, _) = self
            .builder
            .pdas()
            .hot_reserve_bucket(&params.hot_reserve_x_only_public_key)?;

        let signature = self.sign_and_send(&[instruction]).await?;

        info!(
            bucket = %bucket,
            address = %address.address,
            signature = %signature,
            "Hot reserve bucket created"
        );
        log_bucket_event("bucket_created", &bucket.to_string(), Some(&BucketStatus::Activated));

        Ok(CreatedBucket {
            signature,
            bucket,
            address,
        })
    }

    pub async fn reactivate_hot_reserve_bucket(
        &self,
        user_key: &XOnlyPublicKey,
    ) -> Result<Signature, ClientError> {
        self.require_wallet()?;
        let bucket = self
            .find_own_bucket(user_key)
            .await?
            .ok_or(ClientError::BucketNotFound)?;
        let configuration = self.get_two_way_peg_configuration().await?;

        let instruction = self.builder.reactivate_hot_reserve_bucket(
            &bucket.public_key,
            &configuration.layer_fee_collector,
            self.config.bucket_validity_period,
        )?;
        let signature = self.sign_and_send(&[instruction]).await?;

        log_bucket_event(
            "bucket_reactivated",
            &bucket.public_key.to_string(),
            Some(&BucketStatus::Activated),
        );
        Ok(signature)
    }

    /// Queue a zBTC → BTC withdrawal to a Taproot `receiver`
    ///
    /// `request_seed` keys the request PDAs and is written as the request's
    /// slot; `unix_now()` is the usual choice.
    pub async fn add_withdrawal_request(
        &self,
        amount: u64,
        receiver: &str,
        request_seed: u64,
    ) -> Result<Signature, ClientError> {
        self.require_wallet()?;
        let receiver_key = tweaked_key_from_address(receiver, self.config.bitcoin_network)?;
        let configuration = self.get_two_way_peg_configuration().await?;

        let params = AddWithdrawalRequestParams {
            receiver_address: receiver_key.serialize(),
            amount,
            request_seed,
            guardian_setting: self.config.guardian_setting,
            layer_fee_collector: configuration.layer_fee_collector,
        };
        let instruction = self.builder.add_withdrawal_request(&params)?;
        let signature = self.sign_and_send(&[instruction]).await?;

        log_submission(
            EventCategory::Withdrawal,
            "withdrawal_requested",
            &signature.to_string(),
        );
        Ok(signature)
    }

    /// Deposit zBTC into the wallet's position
    pub async fn store(&self, amount: u64) -> Result<Signature, ClientError> {
        let instruction = self
            .builder
            .store(amount, &self.config.guardian_setting)
            .map_err(wallet_or_instruction)?;
        let signature = self.sign_and_send(&[instruction]).await?;

        log_submission(EventCategory::Liquidity, "stored", &signature.to_string());
        Ok(signature)
    }

    /// Withdraw zBTC from the wallet's position
    pub async fn retrieve(&self, amount: u64) -> Result<Signature, ClientError> {
        let instruction = self
            .builder
            .retrieve(amount, &self.config.guardian_setting)
            .map_err(wallet_or_instruction)?;
        let signature = self.sign_and_send(&[instruction]).await?;

        log_submission(EventCategory::Liquidity, "retrieved", &signature.to_string());
        Ok(signature)
    }

    /// Compile, sign and submit `instructions` as one v0 transaction
    pub async fn sign_and_send(
        &self,
        instructions: &[Instruction],
    ) -> Result<Signature, ClientError> {
        let wallet = self.require_wallet()?;
        let payer = wallet.pubkey();

        let blockhash = self.submitter.latest_blockhash().await?;
        let message = v0::Message::try_compile(&payer, instructions, &[], blockhash)
            .map_err(|e| ClientError::MessageCompile(e.to_string()))?;

        let tx = wallet.sign_message(VersionedMessage::V0(message)).await?;

        match self.submitter.submit_and_confirm(&tx).await {
            Ok(signature) => {
                debug!(signature = %signature, payer = %payer, "Transaction confirmed");
                log_submission(EventCategory::Rpc, "transaction_confirmed", &signature.to_string());
                Ok(signature)
            }
            Err(e) => {
                warn!(error = %e, payer = %payer, "Transaction submission failed");
                Err(e)
            }
        }
    }
}

fn wallet_or_instruction(error: InstructionError) -> ClientError {
    match error {
        InstructionError::WalletNotConnected => ClientError::WalletNotConnected,
        other => ClientError::Instruction(other),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("wallet not connected")]
    WalletNotConnected,

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("two-way-peg configuration account not found")]
    ConfigurationNotFound,

    #[error("no hot reserve bucket for this key and guardian setting")]
    BucketNotFound,

    #[error("message compilation failed: {0}")]
    MessageCompile(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Instruction(#[from] InstructionError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Taproot(#[from] TaprootError),

    #[error(transparent)]
    Pda(#[from] PdaError),
}
