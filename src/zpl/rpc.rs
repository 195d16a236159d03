//! Solana RPC Backend
//!
//! `AccountReader` and `TransactionSubmitter` over the nonblocking
//! `solana-client` RPC client at `confirmed` commitment.

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use tracing::debug;

use super::client::{AccountFilter, AccountReader, ClientError, KeyedAccount, TransactionSubmitter};

pub struct RpcBackend {
    rpc: RpcClient,
}

impl RpcBackend {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc: RpcClient::new_with_commitment(rpc_url.into(), CommitmentConfig::confirmed()),
        }
    }

    pub fn url(&self) -> String {
        self.rpc.url()
    }
}

fn to_rpc_filter(filter: &AccountFilter) -> RpcFilterType {
    RpcFilterType::Memcmp(Memcmp::new_raw_bytes(filter.offset, filter.bytes.clone()))
}

#[async_trait]
impl AccountReader for RpcBackend {
    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<AccountFilter>,
    ) -> Result<Vec<KeyedAccount>, ClientError> {
        let config = RpcProgramAccountsConfig {
            filters: Some(filters.iter().map(to_rpc_filter).collect()),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .rpc
            .get_program_accounts_with_config(program_id, config)
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))?;

        debug!(program = %program_id, count = accounts.len(), "getProgramAccounts");

        Ok(accounts
            .into_iter()
            .map(|(address, account)| KeyedAccount {
                address,
                data: account.data,
            })
            .collect())
    }
}

#[async_trait]
impl TransactionSubmitter for RpcBackend {
    async fn latest_blockhash(&self) -> Result<Hash, ClientError> {
        self.rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| ClientError::Rpc(e.to_string()))
    }

    async fn submit_and_confirm(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature, ClientError> {
        self.rpc
            .send_and_confirm_transaction(tx)
            .await
            .map_err(|e| ClientError::Rpc(format!("Transaction failed: {}", e)))
    }
}
