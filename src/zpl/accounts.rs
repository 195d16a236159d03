//! On-chain Account Codec
//!
//! Fixed-width layouts, discriminator first, integers little-endian. Offsets
//! are part of the wire contract: program-account queries filter on raw byte
//! ranges (owner at 8, the user's Bitcoin key at 169 in a bucket).

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use super::discriminator::{AccountKind, DISCRIMINATOR_LEN};
use super::CodecError;

// ============================================================================
// Codec
// ============================================================================

/// Fixed-layout account with a leading discriminator
pub trait AccountCodec: Sized {
    const KIND: AccountKind;
    /// Full account data length, discriminator included
    const LEN: usize;

    /// Account address the decoded value is tagged with
    fn address(&self) -> &Pubkey;

    fn encode(&self) -> Result<Vec<u8>, CodecError>;

    fn decode(address: Pubkey, data: &[u8]) -> Result<Self, CodecError>;
}

/// Length and discriminator checks shared by every account kind
fn check_header(kind: AccountKind, expected_len: usize, data: &[u8]) -> Result<(), CodecError> {
    if data.len() != expected_len {
        return Err(CodecError::LengthMismatch {
            kind,
            expected: expected_len,
            actual: data.len(),
        });
    }
    if data[..DISCRIMINATOR_LEN] != kind.discriminator() {
        return Err(CodecError::DiscriminatorMismatch { kind });
    }
    Ok(())
}

fn serialize_layout<T: BorshSerialize>(
    kind: AccountKind,
    layout: &T,
    expected_len: usize,
) -> Result<Vec<u8>, CodecError> {
    let data = borsh::to_vec(layout).map_err(|e| CodecError::Serialization(e.to_string()))?;
    if data.len() != expected_len {
        return Err(CodecError::LengthMismatch {
            kind,
            expected: expected_len,
            actual: data.len(),
        });
    }
    Ok(data)
}

fn deserialize_layout<T: BorshDeserialize>(
    kind: AccountKind,
    data: &[u8],
) -> Result<T, CodecError> {
    T::try_from_slice(data).map_err(|e| CodecError::InvalidField {
        kind,
        reason: e.to_string(),
    })
}

// ============================================================================
// Hot Reserve Bucket
// ============================================================================

/// Offset of the owner field in bucket and position accounts
pub const OWNER_OFFSET: usize = 8;

/// Offset of the user's Bitcoin x-only key in a bucket
pub const BUCKET_SCRIPT_PATH_KEY_OFFSET: usize = 169;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotReserveBucketStatus {
    Activated,
    Deactivated,
}

impl HotReserveBucketStatus {
    pub fn as_u8(self) -> u8 {
        match self {
            HotReserveBucketStatus::Activated => 0,
            HotReserveBucketStatus::Deactivated => 1,
        }
    }
}

impl TryFrom<u8> for HotReserveBucketStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(HotReserveBucketStatus::Activated),
            1 => Ok(HotReserveBucketStatus::Deactivated),
            other => Err(other),
        }
    }
}

/// Hot reserve bucket account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotReserveBucket {
    pub public_key: Pubkey,
    pub owner: Pubkey,
    pub guardian_setting: Pubkey,
    pub status: HotReserveBucketStatus,
    pub taproot_x_only_public_key: [u8; 32],
    pub tap_tweak_hash: [u8; 32],
    pub key_path_spend_public_key: [u8; 32],
    pub script_path_spend_public_key: [u8; 32],
    pub lock_time: u64,
    pub created_at: u64,
    pub expired_at: u64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct HotReserveBucketLayout {
    discriminator: [u8; 8],
    owner: [u8; 32],
    guardian_setting: [u8; 32],
    status: u8,
    taproot_x_only_public_key: [u8; 32],
    tap_tweak_hash: [u8; 32],
    key_path_spend_public_key: [u8; 32],
    script_path_spend_public_key: [u8; 32],
    lock_time: u64,
    created_at: u64,
    expired_at: u64,
}

impl AccountCodec for HotReserveBucket {
    const KIND: AccountKind = AccountKind::HotReserveBucket;
    const LEN: usize = 225;

    fn address(&self) -> &Pubkey {
        &self.public_key
    }

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let layout = HotReserveBucketLayout {
            discriminator: Self::KIND.discriminator(),
            owner: self.owner.to_bytes(),
            guardian_setting: self.guardian_setting.to_bytes(),
            status: self.status.as_u8(),
            taproot_x_only_public_key: self.taproot_x_only_public_key,
            tap_tweak_hash: self.tap_tweak_hash,
            key_path_spend_public_key: self.key_path_spend_public_key,
            script_path_spend_public_key: self.script_path_spend_public_key,
            lock_time: self.lock_time,
            created_at: self.created_at,
            expired_at: self.expired_at,
        };
        serialize_layout(Self::KIND, &layout, Self::LEN)
    }

    fn decode(address: Pubkey, data: &[u8]) -> Result<Self, CodecError> {
        check_header(Self::KIND, Self::LEN, data)?;
        let layout: HotReserveBucketLayout = deserialize_layout(Self::KIND, data)?;

        let status = HotReserveBucketStatus::try_from(layout.status).map_err(|value| {
            CodecError::InvalidField {
                kind: Self::KIND,
                reason: format!("unknown bucket status {}", value),
            }
        })?;

        Ok(Self {
            public_key: address,
            owner: Pubkey::new_from_array(layout.owner),
            guardian_setting: Pubkey::new_from_array(layout.guardian_setting),
            status,
            taproot_x_only_public_key: layout.taproot_x_only_public_key,
            tap_tweak_hash: layout.tap_tweak_hash,
            key_path_spend_public_key: layout.key_path_spend_public_key,
            script_path_spend_public_key: layout.script_path_spend_public_key,
            lock_time: layout.lock_time,
            created_at: layout.created_at,
            expired_at: layout.expired_at,
        })
    }
}

// ============================================================================
// Two-Way-Peg Configuration
// ============================================================================

/// Program-wide two-way-peg settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoWayPegConfiguration {
    pub public_key: Pubkey,
    pub super_operator_certificate: Pubkey,
    pub zeus_cold_reserve_recovery_public_key: [u8; 32],
    pub zeus_cold_reserve_recovery_lock_time: u64,
    pub layer_fee_collector: Pubkey,
    pub chadbuffer_authority: Pubkey,
    pub cpi_identity: Pubkey,
    pub layer_ca_program_id: Pubkey,
    pub bitcoin_spv_program_id: Pubkey,
    pub liquidity_management_program_id: Pubkey,
    pub bucket_open_fee_amount: u64,
    pub bucket_reactivation_fee_amount: u64,
    pub withdrawal_fee_amount: u64,
    pub miner_fee_rate: u64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct TwoWayPegConfigurationLayout {
    discriminator: [u8; 8],
    super_operator_certificate: [u8; 32],
    zeus_cold_reserve_recovery_public_key: [u8; 32],
    zeus_cold_reserve_recovery_lock_time: u64,
    layer_fee_collector: [u8; 32],
    chadbuffer_authority: [u8; 32],
    cpi_identity: [u8; 32],
    layer_ca_program_id: [u8; 32],
    bitcoin_spv_program_id: [u8; 32],
    liquidity_management_program_id: [u8; 32],
    bucket_open_fee_amount: u64,
    bucket_reactivation_fee_amount: u64,
    withdrawal_fee_amount: u64,
    miner_fee_rate: u64,
}

impl AccountCodec for TwoWayPegConfiguration {
    const KIND: AccountKind = AccountKind::TwoWayPegConfiguration;
    const LEN: usize = 304;

    fn address(&self) -> &Pubkey {
        &self.public_key
    }

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let layout = TwoWayPegConfigurationLayout {
            discriminator: Self::KIND.discriminator(),
            super_operator_certificate: self.super_operator_certificate.to_bytes(),
            zeus_cold_reserve_recovery_public_key: self.zeus_cold_reserve_recovery_public_key,
            zeus_cold_reserve_recovery_lock_time: self.zeus_cold_reserve_recovery_lock_time,
            layer_fee_collector: self.layer_fee_collector.to_bytes(),
            chadbuffer_authority: self.chadbuffer_authority.to_bytes(),
            cpi_identity: self.cpi_identity.to_bytes(),
            layer_ca_program_id: self.layer_ca_program_id.to_bytes(),
            bitcoin_spv_program_id: self.bitcoin_spv_program_id.to_bytes(),
            liquidity_management_program_id: self.liquidity_management_program_id.to_bytes(),
            bucket_open_fee_amount: self.bucket_open_fee_amount,
            bucket_reactivation_fee_amount: self.bucket_reactivation_fee_amount,
            withdrawal_fee_amount: self.withdrawal_fee_amount,
            miner_fee_rate: self.miner_fee_rate,
        };
        serialize_layout(Self::KIND, &layout, Self::LEN)
    }

    fn decode(address: Pubkey, data: &[u8]) -> Result<Self, CodecError> {
        check_header(Self::KIND, Self::LEN, data)?;
        let layout: TwoWayPegConfigurationLayout = deserialize_layout(Self::KIND, data)?;

        Ok(Self {
            public_key: address,
            super_operator_certificate: Pubkey::new_from_array(layout.super_operator_certificate),
            zeus_cold_reserve_recovery_public_key: layout.zeus_cold_reserve_recovery_public_key,
            zeus_cold_reserve_recovery_lock_time: layout.zeus_cold_reserve_recovery_lock_time,
            layer_fee_collector: Pubkey::new_from_array(layout.layer_fee_collector),
            chadbuffer_authority: Pubkey::new_from_array(layout.chadbuffer_authority),
            cpi_identity: Pubkey::new_from_array(layout.cpi_identity),
            layer_ca_program_id: Pubkey::new_from_array(layout.layer_ca_program_id),
            bitcoin_spv_program_id: Pubkey::new_from_array(layout.bitcoin_spv_program_id),
            liquidity_management_program_id: Pubkey::new_from_array(
                layout.liquidity_management_program_id,
            ),
            bucket_open_fee_amount: layout.bucket_open_fee_amount,
            bucket_reactivation_fee_amount: layout.bucket_reactivation_fee_amount,
            withdrawal_fee_amount: layout.withdrawal_fee_amount,
            miner_fee_rate: layout.miner_fee_rate,
        })
    }
}

// ============================================================================
// Position
// ============================================================================

/// Custodial balance entry in the liquidity-management program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub public_key: Pubkey,
    pub owner: Pubkey,
    pub guardian_setting: Pubkey,
    pub stored_amount: u64,
    pub frozen_amount: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Position {
    /// Stored balance not frozen by pending withdrawals
    pub fn available_amount(&self) -> u64 {
        self.stored_amount.saturating_sub(self.frozen_amount)
    }
}

#[derive(BorshSerialize, BorshDeserialize)]
struct PositionLayout {
    discriminator: [u8; 8],
    owner: [u8; 32],
    guardian_setting: [u8; 32],
    stored_amount: u64,
    frozen_amount: u64,
    created_at: u64,
    updated_at: u64,
}

impl AccountCodec for Position {
    const KIND: AccountKind = AccountKind::Position;
    const LEN: usize = 104;

    fn address(&self) -> &Pubkey {
        &self.public_key
    }

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let layout = PositionLayout {
            discriminator: Self::KIND.discriminator(),
            owner: self.owner.to_bytes(),
            guardian_setting: self.guardian_setting.to_bytes(),
            stored_amount: self.stored_amount,
            frozen_amount: self.frozen_amount,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        serialize_layout(Self::KIND, &layout, Self::LEN)
    }

    fn decode(address: Pubkey, data: &[u8]) -> Result<Self, CodecError> {
        check_header(Self::KIND, Self::LEN, data)?;
        let layout: PositionLayout = deserialize_layout(Self::KIND, data)?;

        Ok(Self {
            public_key: address,
            owner: Pubkey::new_from_array(layout.owner),
            guardian_setting: Pubkey::new_from_array(layout.guardian_setting),
            stored_amount: layout.stored_amount,
            frozen_amount: layout.frozen_amount,
            created_at: layout.created_at,
            updated_at: layout.updated_at,
        })
    }
}

// ============================================================================
// Tagged Union
// ============================================================================

/// Any account this client understands, picked by discriminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZplAccount {
    TwoWayPegConfiguration(TwoWayPegConfiguration),
    HotReserveBucket(HotReserveBucket),
    Position(Position),
}

impl ZplAccount {
    pub fn decode(address: Pubkey, data: Option<&[u8]>) -> Result<Self, CodecError> {
        let data = data.ok_or(CodecError::MissingData(address))?;
        let kind = AccountKind::from_data(data).ok_or(CodecError::UnknownDiscriminator)?;

        Ok(match kind {
            AccountKind::TwoWayPegConfiguration => {
                ZplAccount::TwoWayPegConfiguration(TwoWayPegConfiguration::decode(address, data)?)
            }
            AccountKind::HotReserveBucket => {
                ZplAccount::HotReserveBucket(HotReserveBucket::decode(address, data)?)
            }
            AccountKind::Position => ZplAccount::Position(Position::decode(address, data)?),
        })
    }

    pub fn kind(&self) -> AccountKind {
        match self {
            ZplAccount::TwoWayPegConfiguration(_) => AccountKind::TwoWayPegConfiguration,
            ZplAccount::HotReserveBucket(_) => AccountKind::HotReserveBucket,
            ZplAccount::Position(_) => AccountKind::Position,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            ZplAccount::TwoWayPegConfiguration(config) => config.encode(),
            ZplAccount::HotReserveBucket(bucket) => bucket.encode(),
            ZplAccount::Position(position) => position.encode(),
        }
    }
}
