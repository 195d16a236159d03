//! Instruction Payloads
//!
//! One leading discriminator byte followed by a borsh-encoded argument
//! struct. Discriminator values are fixed by the deployed programs.

use borsh::{BorshDeserialize, BorshSerialize};

use super::CodecError;

/// Two-way-peg: open a bucket
pub const CREATE_HOT_RESERVE_BUCKET: u8 = 5;
/// Two-way-peg: extend a bucket's expiry
pub const REACTIVATE_HOT_RESERVE_BUCKET: u8 = 7;
/// Liquidity-management: withdraw from a position
pub const RETRIEVE: u8 = 9;
/// Liquidity-management: deposit into a position
pub const STORE: u8 = 10;
/// Two-way-peg: queue a BTC withdrawal
pub const ADD_WITHDRAWAL_REQUEST: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CreateHotReserveBucketArgs {
    pub script_path_spend_public_key: [u8; 32],
    pub lock_time: u64,
    pub validity_period: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ReactivateHotReserveBucketArgs {
    pub validity_period: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AddWithdrawalRequestArgs {
    pub receiver_address: [u8; 32],
    pub current_slot: u64,
    pub withdrawal_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AmountArgs {
    pub amount: u64,
}

/// Instruction data understood by the two programs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZplInstruction {
    CreateHotReserveBucket(CreateHotReserveBucketArgs),
    ReactivateHotReserveBucket(ReactivateHotReserveBucketArgs),
    AddWithdrawalRequest(AddWithdrawalRequestArgs),
    Retrieve(AmountArgs),
    Store(AmountArgs),
}

/// Narrow a seconds value to the u32 the programs store
fn validity_period_u32(seconds: u64) -> Result<u32, CodecError> {
    u32::try_from(seconds).map_err(|_| CodecError::EncodingOverflow {
        field: "validity_period",
        value: seconds,
    })
}

fn decode_args<T: BorshDeserialize>(
    discriminator: u8,
    args: &[u8],
    expected_len: usize,
) -> Result<T, CodecError> {
    if args.len() != expected_len {
        return Err(CodecError::InstructionLength {
            discriminator,
            expected: expected_len + 1,
            actual: args.len() + 1,
        });
    }
    T::try_from_slice(args).map_err(|e| CodecError::Serialization(e.to_string()))
}

impl ZplInstruction {
    pub fn create_hot_reserve_bucket(
        script_path_spend_public_key: [u8; 32],
        lock_time: u64,
        validity_period_secs: u64,
    ) -> Result<Self, CodecError> {
        Ok(ZplInstruction::CreateHotReserveBucket(CreateHotReserveBucketArgs {
            script_path_spend_public_key,
            lock_time,
            validity_period: validity_period_u32(validity_period_secs)?,
        }))
    }

    pub fn reactivate_hot_reserve_bucket(validity_period_secs: u64) -> Result<Self, CodecError> {
        Ok(ZplInstruction::ReactivateHotReserveBucket(
            ReactivateHotReserveBucketArgs {
                validity_period: validity_period_u32(validity_period_secs)?,
            },
        ))
    }

    pub fn add_withdrawal_request(
        receiver_address: [u8; 32],
        current_slot: u64,
        withdrawal_amount: u64,
    ) -> Self {
        ZplInstruction::AddWithdrawalRequest(AddWithdrawalRequestArgs {
            receiver_address,
            current_slot,
            withdrawal_amount,
        })
    }

    pub fn discriminator(&self) -> u8 {
        match self {
            ZplInstruction::CreateHotReserveBucket(_) => CREATE_HOT_RESERVE_BUCKET,
            ZplInstruction::ReactivateHotReserveBucket(_) => REACTIVATE_HOT_RESERVE_BUCKET,
            ZplInstruction::AddWithdrawalRequest(_) => ADD_WITHDRAWAL_REQUEST,
            ZplInstruction::Retrieve(_) => RETRIEVE,
            ZplInstruction::Store(_) => STORE,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let args = match self {
            ZplInstruction::CreateHotReserveBucket(args) => borsh::to_vec(args),
            ZplInstruction::ReactivateHotReserveBucket(args) => borsh::to_vec(args),
            ZplInstruction::AddWithdrawalRequest(args) => borsh::to_vec(args),
            ZplInstruction::Retrieve(args) | ZplInstruction::Store(args) => borsh::to_vec(args),
        }
        .map_err(|e| CodecError::Serialization(e.to_string()))?;

        let mut data = Vec::with_capacity(1 + args.len());
        data.push(self.discriminator());
        data.extend_from_slice(&args);
        Ok(data)
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let (&discriminator, args) = data.split_first().ok_or(CodecError::EmptyInstruction)?;

        match discriminator {
            CREATE_HOT_RESERVE_BUCKET => Ok(ZplInstruction::CreateHotReserveBucket(decode_args(
                discriminator,
                args,
                44,
            )?)),
            REACTIVATE_HOT_RESERVE_BUCKET => Ok(ZplInstruction::ReactivateHotReserveBucket(
                decode_args(discriminator, args, 4)?,
            )),
            ADD_WITHDRAWAL_REQUEST => Ok(ZplInstruction::AddWithdrawalRequest(decode_args(
                discriminator,
                args,
                48,
            )?)),
            RETRIEVE => Ok(ZplInstruction::Retrieve(decode_args(discriminator, args, 8)?)),
            STORE => Ok(ZplInstruction::Store(decode_args(discriminator, args, 8)?)),
            other => Err(CodecError::UnknownInstruction(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_bucket_bytes() {
        let ix = ZplInstruction::create_hot_reserve_bucket([0xab; 32], 4320, 2_592_000).unwrap();
        let data = ix.encode().unwrap();

        assert_eq!(data.len(), 45);
        assert_eq!(data[0], 5);
        assert_eq!(data[1..33], [0xab; 32]);
        assert_eq!(data[33..41], 4320u64.to_le_bytes());
        assert_eq!(data[41..45], 2_592_000u32.to_le_bytes());
        assert_eq!(ZplInstruction::decode(&data).unwrap(), ix);
    }

    #[test]
    fn test_reactivate_bytes() {
        let data = ZplInstruction::reactivate_hot_reserve_bucket(86_400)
            .unwrap()
            .encode()
            .unwrap();
        assert_eq!(data, [&[7u8][..], &86_400u32.to_le_bytes()].concat());
    }

    #[test]
    fn test_withdrawal_request_bytes() {
        let ix = ZplInstruction::add_withdrawal_request([1u8; 32], 1_700_000_000, 50_000);
        let data = ix.encode().unwrap();

        assert_eq!(data.len(), 49);
        assert_eq!(data[0], 18);
        assert_eq!(data[33..41], 1_700_000_000u64.to_le_bytes());
        assert_eq!(data[41..49], 50_000u64.to_le_bytes());
        assert_eq!(ZplInstruction::decode(&data).unwrap(), ix);
    }

    #[test]
    fn test_store_and_retrieve_bytes() {
        let store = ZplInstruction::Store(AmountArgs { amount: 42 }).encode().unwrap();
        let retrieve = ZplInstruction::Retrieve(AmountArgs { amount: 42 }).encode().unwrap();

        assert_eq!(store[0], 10);
        assert_eq!(retrieve[0], 9);
        assert_eq!(store[1..], retrieve[1..]);
        assert_eq!(store.len(), 9);
    }

    #[test]
    fn test_validity_period_overflow() {
        let too_long = u64::from(u32::MAX) + 1;
        assert!(matches!(
            ZplInstruction::create_hot_reserve_bucket([0; 32], 1, too_long),
            Err(CodecError::EncodingOverflow { field: "validity_period", .. })
        ));
        assert!(ZplInstruction::reactivate_hot_reserve_bucket(u64::from(u32::MAX)).is_ok());
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        assert!(matches!(ZplInstruction::decode(&[]), Err(CodecError::EmptyInstruction)));
        assert!(matches!(
            ZplInstruction::decode(&[3, 0, 0]),
            Err(CodecError::UnknownInstruction(3))
        ));
        assert!(matches!(
            ZplInstruction::decode(&[10, 1, 2, 3]),
            Err(CodecError::InstructionLength { discriminator: 10, expected: 9, actual: 4 })
        ));
    }
}
