//! UTXO Selection
//!
//! Smallest-first greedy selection with a running virtual-size estimate.
//! The scan order is load-bearing: callers decide "deposit all" by comparing
//! the requested amount against [`estimate_max_spendable`], so both must walk
//! the same filtered, ascending input list.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::DepositError;

/// Fixed transaction overhead (version, locktime, counts, segwit marker)
pub const TX_BASE_VBYTES: u64 = 10;

/// One P2TR key-path input
pub const TX_INPUT_VBYTES: u64 = 58;

/// One P2TR output
pub const TX_OUTPUT_VBYTES: u64 = 44;

/// Change at or below this is left to the miner
pub const DUST_THRESHOLD_SATS: u64 = 546;

/// Unspent output owned by the depositing wallet
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    /// Transaction id, display (big-endian) hex
    pub transaction_id: String,
    pub transaction_index: u32,
    pub satoshis: u64,
}

impl Utxo {
    pub fn new(transaction_id: impl Into<String>, transaction_index: u32, satoshis: u64) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            transaction_index,
            satoshis,
        }
    }

    /// Worth spending at this fee rate: value strictly exceeds its own input cost
    pub fn is_spendable(&self, fee_rate: u64) -> bool {
        self.satoshis > fee_rate.saturating_mul(TX_INPUT_VBYTES)
    }
}

/// Result of a selection pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Chosen inputs, ascending by value
    pub inputs: Vec<Utxo>,
    /// Sum of chosen input values
    pub total_sats: u64,
    /// Estimated virtual size including outputs
    pub vbytes: u64,
    pub fee_sats: u64,
    /// Left over after amount and fee
    pub return_amount: u64,
}

impl Selection {
    /// Whether the leftover is worth a change output
    pub fn has_change(&self) -> bool {
        self.return_amount > DUST_THRESHOLD_SATS
    }
}

/// Spendable UTXOs sorted ascending by value.
fn spendable_ascending(utxos: &[Utxo], fee_rate: u64) -> Vec<&Utxo> {
    let mut spendable: Vec<&Utxo> = utxos.iter().filter(|u| u.is_spendable(fee_rate)).collect();
    spendable.sort_by_key(|u| u.satoshis);
    spendable
}

/// Select inputs for `amount` sats at `fee_rate` sat/vB.
///
/// With `spend_all` the change output is left out of the size estimate and
/// the scan keeps going until the deposit output's fee is covered as well.
pub fn select_utxos(
    utxos: &[Utxo],
    amount: u64,
    fee_rate: u64,
    spend_all: bool,
) -> Result<Selection, DepositError> {
    if utxos.is_empty() {
        return Err(DepositError::NoUtxos);
    }
    if fee_rate < 1 {
        return Err(DepositError::InvalidFeeRate(fee_rate));
    }

    let spendable = spendable_ascending(utxos, fee_rate);
    if spendable.is_empty() {
        return Err(DepositError::NoSpendableUtxos {
            count: utxos.len(),
            fee_rate,
        });
    }

    let available: u64 = spendable.iter().map(|u| u.satoshis).sum();
    if available < amount {
        return Err(DepositError::InsufficientFunds {
            required: amount,
            available,
        });
    }

    // A sweep stops only once its single output is paid for too, so
    // `amount == estimate_max_spendable(..)` always reaches every input.
    let stop_output_vbytes = if spend_all { TX_OUTPUT_VBYTES } else { 0 };

    let mut inputs = Vec::new();
    let mut total_sats = 0u64;
    let mut vbytes = TX_BASE_VBYTES;

    for utxo in spendable {
        vbytes += TX_INPUT_VBYTES;
        total_sats += utxo.satoshis;
        inputs.push(utxo.clone());

        let covered = fee_rate.saturating_mul(vbytes + stop_output_vbytes);
        if total_sats >= amount.saturating_add(covered) {
            break;
        }
    }

    vbytes += TX_OUTPUT_VBYTES;
    if !spend_all {
        vbytes += TX_OUTPUT_VBYTES;
    }

    let fee_sats = fee_rate.saturating_mul(vbytes);
    let required = amount.saturating_add(fee_sats);
    if total_sats < required {
        return Err(DepositError::InsufficientFundsForFee {
            required,
            available: total_sats,
        });
    }

    let selection = Selection {
        inputs,
        total_sats,
        vbytes,
        fee_sats,
        return_amount: total_sats - required,
    };

    debug!(
        inputs = selection.inputs.len(),
        total_sats = selection.total_sats,
        vbytes = selection.vbytes,
        fee_sats = selection.fee_sats,
        return_amount = selection.return_amount,
        spend_all,
        "Selected deposit inputs"
    );

    Ok(selection)
}

/// Largest amount a full sweep of `utxos` can deliver at `fee_rate`.
///
/// Sizes the sweep with every spendable input and a single output. Returns 0
/// when nothing is spendable or fees eat the whole balance.
pub fn estimate_max_spendable(utxos: &[Utxo], fee_rate: u64) -> u64 {
    let spendable = spendable_ascending(utxos, fee_rate);
    if spendable.is_empty() {
        return 0;
    }

    let total: u64 = spendable.iter().map(|u| u.satoshis).sum();
    let vbytes = TX_BASE_VBYTES + TX_INPUT_VBYTES * spendable.len() as u64 + TX_OUTPUT_VBYTES;

    total.saturating_sub(fee_rate.saturating_mul(vbytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(n: u8, satoshis: u64) -> Utxo {
        Utxo::new(hex::encode([n; 32]), u32::from(n), satoshis)
    }

    #[test]
    fn test_single_input_with_change() {
        let selection = select_utxos(&[utxo(1, 20_000)], 10_000, 2, false).unwrap();

        assert_eq!(selection.inputs.len(), 1);
        assert_eq!(selection.vbytes, 10 + 58 + 44 + 44);
        assert_eq!(selection.fee_sats, 312);
        assert_eq!(selection.return_amount, 9_688);
        assert!(selection.has_change());
    }

    #[test]
    fn test_ascending_scan_takes_small_input_first() {
        // 5000 clears the 116-sat spendability bar at 2 sat/vB, so the scan
        // consumes it before reaching 20000.
        let utxos = vec![utxo(2, 20_000), utxo(1, 5_000)];
        let selection = select_utxos(&utxos, 10_000, 2, false).unwrap();

        let values: Vec<u64> = selection.inputs.iter().map(|u| u.satoshis).collect();
        assert_eq!(values, vec![5_000, 20_000]);
        assert_eq!(selection.vbytes, 10 + 2 * 58 + 2 * 44);
        assert_eq!(selection.fee_sats, 428);
        assert_eq!(selection.return_amount, 14_572);
    }

    #[test]
    fn test_unspendable_inputs_are_skipped() {
        // 116 == 2 * 58 is not strictly greater, so it is filtered
        let utxos = vec![utxo(1, 116), utxo(2, 20_000)];
        let selection = select_utxos(&utxos, 10_000, 2, false).unwrap();

        assert_eq!(selection.inputs, vec![utxo(2, 20_000)]);
    }

    #[test]
    fn test_empty_set() {
        assert!(matches!(select_utxos(&[], 1, 1, false), Err(DepositError::NoUtxos)));
    }

    #[test]
    fn test_zero_fee_rate_rejected() {
        assert!(matches!(
            select_utxos(&[utxo(1, 10_000)], 1_000, 0, false),
            Err(DepositError::InvalidFeeRate(0))
        ));
    }

    #[test]
    fn test_all_inputs_below_threshold() {
        let utxos = vec![utxo(1, 500), utxo(2, 580)];
        assert!(matches!(
            select_utxos(&utxos, 100, 10, false),
            Err(DepositError::NoSpendableUtxos { count: 2, fee_rate: 10 })
        ));
    }

    #[test]
    fn test_amount_above_balance() {
        let utxos = vec![utxo(1, 5_000), utxo(2, 6_000)];
        assert!(matches!(
            select_utxos(&utxos, 11_001, 1, false),
            Err(DepositError::InsufficientFunds { required: 11_001, available: 11_000 })
        ));
    }

    #[test]
    fn test_balance_covers_amount_but_not_fee() {
        let err = select_utxos(&[utxo(1, 10_000)], 9_900, 2, false).unwrap_err();
        assert!(matches!(
            err,
            DepositError::InsufficientFundsForFee { required: 10_212, available: 10_000 }
        ));
    }

    #[test]
    fn test_dust_change_goes_to_fee() {
        let selection = select_utxos(&[utxo(1, 10_000)], 9_300, 1, false).unwrap();
        assert_eq!(selection.return_amount, 544);
        assert!(!selection.has_change());
    }

    #[test]
    fn test_max_spendable() {
        let utxos = vec![utxo(1, 5_000), utxo(2, 20_000), utxo(3, 100)];
        // 100 is filtered at 2 sat/vB
        assert_eq!(estimate_max_spendable(&utxos, 2), 25_000 - 2 * (10 + 2 * 58 + 44));
        assert_eq!(estimate_max_spendable(&[], 2), 0);
        assert_eq!(estimate_max_spendable(&[utxo(1, 150)], 2), 0);
    }

    #[test]
    fn test_spend_all_consumes_max_spendable() {
        let utxos = vec![utxo(1, 5_000), utxo(2, 20_000), utxo(3, 75_000)];
        for fee_rate in [1, 2, 5, 25] {
            let max = estimate_max_spendable(&utxos, fee_rate);
            let selection = select_utxos(&utxos, max, fee_rate, true).unwrap();

            assert_eq!(selection.inputs.len(), 3, "fee rate {}", fee_rate);
            assert_eq!(selection.return_amount, 0, "fee rate {}", fee_rate);
        }
    }

    #[test]
    fn test_spend_all_with_inputs_near_threshold() {
        // each input barely clears its own 58-vbyte cost
        let utxos = vec![utxo(1, 100), utxo(2, 100)];
        let max = estimate_max_spendable(&utxos, 1);
        assert_eq!(max, 200 - (10 + 2 * 58 + 44));

        let selection = select_utxos(&utxos, max, 1, true).unwrap();
        assert_eq!(selection.inputs.len(), 2);
        assert_eq!(selection.fee_sats, 170);
        assert_eq!(selection.return_amount, 0);

        let utxos = vec![utxo(1, 59), utxo(2, 60), utxo(3, 61), utxo(4, 900)];
        for fee_rate in [1, 2] {
            let max = estimate_max_spendable(&utxos, fee_rate);
            if max == 0 {
                continue;
            }
            let selection = select_utxos(&utxos, max, fee_rate, true).unwrap();
            assert_eq!(selection.return_amount, 0, "fee rate {}", fee_rate);
        }
    }

    #[test]
    fn test_value_is_conserved() {
        let utxos = vec![utxo(1, 1_200), utxo(2, 7_000), utxo(3, 40_000), utxo(4, 3_300)];
        for (amount, fee_rate) in [(1_000, 1), (8_000, 3), (45_000, 4), (10, 20)] {
            let selection = select_utxos(&utxos, amount, fee_rate, false).unwrap();
            let inputs: u64 = selection.inputs.iter().map(|u| u.satoshis).sum();

            assert_eq!(inputs, selection.total_sats);
            assert_eq!(inputs, amount + selection.fee_sats + selection.return_amount);
            assert!(selection.fee_sats >= fee_rate * selection.vbytes);
        }
    }
}
