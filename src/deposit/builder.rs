//! Deposit PSBT Builder
//!
//! Builds the unsigned version-2 PSBT that moves wallet UTXOs into a hot
//! reserve bucket. Inputs are the user's own P2TR outputs, so every input
//! carries its witness UTXO and the internal key a Taproot signer needs.

use std::str::FromStr;

use bitcoin::{
    absolute::LockTime, psbt::Psbt, transaction::Version, Address, Amount, FeeRate, OutPoint,
    ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness, XOnlyPublicKey,
};

use super::selector::{select_utxos, Selection, Utxo};
use super::DepositError;
use crate::common::logging::log_deposit_plan;
use crate::keys::BitcoinNetwork;
use crate::taproot::{derive_wallet_address, WalletKeyType};

/// Builds deposit PSBTs for one network
#[derive(Debug, Clone, Copy)]
pub struct DepositTxBuilder {
    network: BitcoinNetwork,
}

impl DepositTxBuilder {
    pub fn new(network: BitcoinNetwork) -> Self {
        Self { network }
    }

    pub fn network(&self) -> BitcoinNetwork {
        self.network
    }

    /// Validate a Bitcoin address for this network
    pub fn validate_address(&self, address: &str) -> Result<Address, DepositError> {
        Address::from_str(address)
            .map_err(|e| DepositError::InvalidAddress(e.to_string()))?
            .require_network(self.network.to_network())
            .map_err(|e| DepositError::InvalidAddress(e.to_string()))
    }

    /// Build an unsigned deposit
    ///
    /// # Arguments
    /// * `utxos` - Wallet UTXOs, any order
    /// * `destination` - Bucket address receiving `amount`
    /// * `amount` - Sats delivered to `destination`
    /// * `user_internal_key` - Wallet key; inputs and change use its P2TR output
    /// * `fee_rate` - sat/vB
    /// * `spend_all` - Size the transaction without a change output
    pub fn build(
        &self,
        utxos: &[Utxo],
        destination: &str,
        amount: u64,
        user_internal_key: &XOnlyPublicKey,
        fee_rate: u64,
        spend_all: bool,
    ) -> Result<DepositPlan, DepositError> {
        let destination = self.validate_address(destination)?;
        let selection = select_utxos(utxos, amount, fee_rate, spend_all)?;

        let max_fee_rate = fee_rate
            .checked_add(1)
            .and_then(FeeRate::from_sat_per_vb)
            .ok_or(DepositError::InvalidFeeRate(fee_rate))?;

        let user_address =
            derive_wallet_address(user_internal_key, self.network, WalletKeyType::Internal);
        let user_script = user_address.script_pubkey();

        let inputs = selection
            .inputs
            .iter()
            .map(|utxo| {
                let txid = Txid::from_str(&utxo.transaction_id)
                    .map_err(|e| DepositError::InvalidTxid(e.to_string()))?;

                Ok(TxIn {
                    previous_output: OutPoint {
                        txid,
                        vout: utxo.transaction_index,
                    },
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
            })
            .collect::<Result<Vec<TxIn>, DepositError>>()?;

        let mut outputs = vec![TxOut {
            value: Amount::from_sat(amount),
            script_pubkey: destination.script_pubkey(),
        }];

        let change_sats = if selection.has_change() {
            outputs.push(TxOut {
                value: Amount::from_sat(selection.return_amount),
                script_pubkey: user_script.clone(),
            });
            Some(selection.return_amount)
        } else {
            None
        };

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs,
            output: outputs,
        };

        let mut psbt = Psbt::from_unsigned_tx(tx).map_err(|e| DepositError::Psbt(e.to_string()))?;
        for (input, utxo) in psbt.inputs.iter_mut().zip(&selection.inputs) {
            input.witness_utxo = Some(TxOut {
                value: Amount::from_sat(utxo.satoshis),
                script_pubkey: user_script.clone(),
            });
            input.tap_internal_key = Some(*user_internal_key);
        }

        log_deposit_plan(
            &psbt.unsigned_tx.compute_txid().to_string(),
            &destination.to_string(),
            amount,
            selection.fee_sats,
            selection.inputs.len(),
            change_sats,
        );

        Ok(DepositPlan {
            psbt,
            amount_to_send: amount,
            return_amount: selection.return_amount,
            change_sats,
            max_fee_rate,
            selection,
        })
    }
}

/// Build an unsigned deposit in one call
#[allow(clippy::too_many_arguments)]
pub fn build_deposit(
    utxos: &[Utxo],
    destination: &str,
    amount: u64,
    user_internal_key: &XOnlyPublicKey,
    fee_rate: u64,
    network: BitcoinNetwork,
    spend_all: bool,
) -> Result<DepositPlan, DepositError> {
    DepositTxBuilder::new(network).build(
        utxos,
        destination,
        amount,
        user_internal_key,
        fee_rate,
        spend_all,
    )
}

/// Unsigned deposit ready for the wallet to sign
#[derive(Debug, Clone)]
pub struct DepositPlan {
    pub psbt: Psbt,
    pub amount_to_send: u64,
    /// Leftover after amount and estimated fee (may be dust)
    pub return_amount: u64,
    /// Change actually emitted, if above dust
    pub change_sats: Option<u64>,
    /// Upper bound enforced when extracting the signed transaction
    pub max_fee_rate: FeeRate,
    selection: Selection,
}

impl DepositPlan {
    pub fn used_utxos(&self) -> &[Utxo] {
        &self.selection.inputs
    }

    pub fn unsigned_tx(&self) -> &Transaction {
        &self.psbt.unsigned_tx
    }

    pub fn txid(&self) -> Txid {
        self.psbt.unsigned_tx.compute_txid()
    }

    /// Estimated virtual size used for the fee
    pub fn estimated_vbytes(&self) -> u64 {
        self.selection.vbytes
    }

    /// Fee actually paid: inputs minus outputs, including absorbed dust
    pub fn fee_paid(&self) -> u64 {
        let outputs: u64 = self
            .psbt
            .unsigned_tx
            .output
            .iter()
            .map(|o| o.value.to_sat())
            .sum();
        self.selection.total_sats.saturating_sub(outputs)
    }

    /// Serialized PSBT for the external signer
    pub fn serialize_psbt(&self) -> Vec<u8> {
        self.psbt.serialize()
    }

    pub fn psbt_hex(&self) -> String {
        hex::encode(self.serialize_psbt())
    }

    /// Finalized transaction from the signer's PSBT, with the fee-rate guard
    pub fn extract_signed(&self, signed: Psbt) -> Result<Transaction, DepositError> {
        if signed.unsigned_tx.compute_txid() != self.txid() {
            return Err(DepositError::SignedPsbtMismatch);
        }

        signed
            .extract_tx_with_fee_rate_limit(self.max_fee_rate)
            .map_err(|e| DepositError::Extraction(e.to_string()))
    }
}
