//! Hot Reserve Bucket Taproot Derivation
//!
//! A hot reserve bucket is a 2-path Taproot output:
//!
//! ## Spending Paths
//! - **Key Path**: the guardian's hot-reserve key, spendable at any time
//! - **Script Path**: the user's key, after a relative timelock
//!   (`<lock> OP_CHECKSEQUENCEVERIFY OP_DROP <user> OP_CHECKSIG`)
//!
//! The single script leaf sits at depth 0, so the Merkle root equals the leaf
//! hash. Everything here is deterministic: the same inputs always give the
//! same address, tweak and Merkle root, which is what the on-chain bucket
//! record is checked against.

use std::str::FromStr;

use bitcoin::hashes::Hash;
use bitcoin::key::{Secp256k1, TweakedPublicKey};
use bitcoin::opcodes::all::*;
use bitcoin::script::Builder as ScriptBuilder;
use bitcoin::taproot::{ControlBlock, LeafVersion, TaprootBuilder, TaprootSpendInfo};
use bitcoin::{Address, ScriptBuf, WitnessVersion, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keys::{parse_x_only_pubkey, x_only_from_bytes, BitcoinNetwork, KeyError};

// ============================================================================
// Constants
// ============================================================================

/// Default relative lock: 144 blocks/day * 30 days
pub const DEFAULT_UNLOCK_BLOCK_HEIGHT: u32 = 4320;

/// BIP-68 block-based relative locks are 16 bits
pub const MAX_RELATIVE_LOCK_BLOCKS: u32 = 0xFFFF;

// ============================================================================
// Bucket Address
// ============================================================================

/// Derived hot reserve bucket
#[derive(Clone, Debug)]
pub struct BucketAddress {
    pub address: Address,
    /// Unlock script committed in the single leaf
    pub script: ScriptBuf,
    /// Merkle root of the script tree (= leaf hash)
    pub merkle_root: [u8; 32],
    /// Tweaked output key carried in the witness program
    pub tweaked_pubkey: XOnlyPublicKey,
    /// TapTweak hash applied to the key-path key
    pub tap_tweak: [u8; 32],
    pub lock_time_blocks: u32,
    pub network: BitcoinNetwork,
    spend_info: TaprootSpendInfo,
}

/// Serializable view of a bucket address
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAddressInfo {
    pub address: String,
    pub script: String,
    pub merkle_root: String,
    pub tweaked_pubkey: String,
    pub tap_tweak: String,
    pub lock_time_blocks: u32,
    pub network: BitcoinNetwork,
}

impl BucketAddress {
    /// Output script paying to the bucket
    pub fn script_pubkey(&self) -> ScriptBuf {
        self.address.script_pubkey()
    }

    pub fn spend_info(&self) -> &TaprootSpendInfo {
        &self.spend_info
    }

    /// Control block for a script-path (timelock) spend
    pub fn control_block(&self) -> Option<ControlBlock> {
        self.spend_info
            .control_block(&(self.script.clone(), LeafVersion::TapScript))
    }

    pub fn to_info(&self) -> BucketAddressInfo {
        BucketAddressInfo {
            address: self.address.to_string(),
            script: hex::encode(self.script.as_bytes()),
            merkle_root: hex::encode(self.merkle_root),
            tweaked_pubkey: hex::encode(self.tweaked_pubkey.serialize()),
            tap_tweak: hex::encode(self.tap_tweak),
            lock_time_blocks: self.lock_time_blocks,
            network: self.network,
        }
    }
}

/// Build the timelock unlock script for the user
///
/// Script: `<lock_time_blocks> OP_CHECKSEQUENCEVERIFY OP_DROP <user_pubkey> OP_CHECKSIG`
///
/// The lock is pushed as a minimal script number, so values 1..=16 become
/// `OP_1`..`OP_16`.
pub fn build_unlock_script(user_pubkey: &XOnlyPublicKey, lock_time_blocks: u32) -> ScriptBuf {
    ScriptBuilder::new()
        .push_int(i64::from(lock_time_blocks))
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_x_only_key(user_pubkey)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Derive the hot reserve bucket address for a guardian/user key pair
///
/// # Arguments
/// * `key_path_key` - Guardian hot-reserve key (Taproot internal key)
/// * `script_path_key` - User key for the timelocked leaf
/// * `lock_time_blocks` - Relative lock in blocks
/// * `network` - Bitcoin network
pub fn derive_bucket_address(
    key_path_key: &XOnlyPublicKey,
    script_path_key: &XOnlyPublicKey,
    lock_time_blocks: u32,
    network: BitcoinNetwork,
) -> Result<BucketAddress, TaprootError> {
    if lock_time_blocks > MAX_RELATIVE_LOCK_BLOCKS {
        return Err(TaprootError::InvalidLockTime(lock_time_blocks));
    }

    let secp = Secp256k1::verification_only();
    let script = build_unlock_script(script_path_key, lock_time_blocks);

    let spend_info = TaprootBuilder::new()
        .add_leaf(0, script.clone())
        .map_err(|e| TaprootError::AddressDerivation(e.to_string()))?
        .finalize(&secp, *key_path_key)
        .map_err(|_| TaprootError::AddressDerivation("incomplete script tree".to_string()))?;

    let merkle_root = spend_info
        .merkle_root()
        .ok_or_else(|| TaprootError::AddressDerivation("missing merkle root".to_string()))?
        .to_byte_array();
    let tap_tweak = spend_info.tap_tweak().to_byte_array();
    let output_key = spend_info.output_key();
    let address = Address::p2tr_tweaked(output_key, network.to_network());

    debug!(
        address = %address,
        lock_time_blocks,
        network = %network,
        "Derived hot reserve bucket address"
    );

    Ok(BucketAddress {
        address,
        script,
        merkle_root,
        tweaked_pubkey: output_key.to_inner(),
        tap_tweak,
        lock_time_blocks,
        network,
        spend_info,
    })
}

// ============================================================================
// Wallet Addresses
// ============================================================================

/// How a 32-byte key should be placed in a P2TR output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKeyType {
    /// Internal key, BIP-86 tweaked with no script tree
    Internal,
    /// Already the output key
    Tweaked,
}

/// P2TR address for a wallet key
pub fn derive_wallet_address(
    key: &XOnlyPublicKey,
    network: BitcoinNetwork,
    key_type: WalletKeyType,
) -> Address {
    match key_type {
        WalletKeyType::Internal => {
            let secp = Secp256k1::verification_only();
            Address::p2tr(&secp, *key, None, network.to_network())
        }
        WalletKeyType::Tweaked => Address::p2tr_tweaked(
            TweakedPublicKey::dangerous_assume_tweaked(*key),
            network.to_network(),
        ),
    }
}

/// P2TR address for a hex-encoded x-only key
pub fn x_only_hex_to_p2tr(
    key_hex: &str,
    network: BitcoinNetwork,
    key_type: WalletKeyType,
) -> Result<Address, TaprootError> {
    let key = parse_x_only_pubkey(key_hex)?;
    Ok(derive_wallet_address(&key, network, key_type))
}

/// Extract the tweaked output key from a P2TR address
///
/// Withdrawal receivers are registered on-chain by this key rather than by
/// the address string.
pub fn tweaked_key_from_address(
    address: &str,
    network: BitcoinNetwork,
) -> Result<XOnlyPublicKey, TaprootError> {
    let address = Address::from_str(address)
        .map_err(|e| TaprootError::InvalidAddress(e.to_string()))?
        .require_network(network.to_network())
        .map_err(|e| TaprootError::InvalidAddress(e.to_string()))?;

    let program = address
        .witness_program()
        .ok_or_else(|| TaprootError::NotTaproot(address.to_string()))?;
    if program.version() != WitnessVersion::V1 {
        return Err(TaprootError::NotTaproot(address.to_string()));
    }

    Ok(x_only_from_bytes(program.program().as_bytes())?)
}

/// Errors for Taproot operations
#[derive(Debug, thiserror::Error)]
pub enum TaprootError {
    #[error("lock time {0} exceeds the 16-bit relative lock range")]
    InvalidLockTime(u32),

    #[error("failed to derive taproot output: {0}")]
    AddressDerivation(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("not a taproot address: {0}")]
    NotTaproot(String),

    #[error(transparent)]
    Key(#[from] KeyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const K1: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const K2: &str = "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";
    const K3: &str = "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9";

    fn key(hex_str: &str) -> XOnlyPublicKey {
        parse_x_only_pubkey(hex_str).unwrap()
    }

    #[test]
    fn test_unlock_script_layout() {
        let script = build_unlock_script(&key(K2), DEFAULT_UNLOCK_BLOCK_HEIGHT);
        assert_eq!(
            hex::encode(script.as_bytes()),
            format!("02e010b27520{}ac", K2)
        );
    }

    #[test]
    fn test_small_lock_uses_small_int_opcode() {
        let script = build_unlock_script(&key(K2), 16);
        assert_eq!(script.as_bytes()[0], OP_PUSHNUM_16.to_u8());
        assert_eq!(script.as_bytes()[1], OP_CSV.to_u8());
    }

    #[test]
    fn test_bucket_address_known_vector() {
        let bucket =
            derive_bucket_address(&key(K1), &key(K2), 4320, BitcoinNetwork::Regtest).unwrap();

        assert_eq!(
            bucket.address.to_string(),
            "bcrt1pcj60h0872jfs0upu8g36rhhwdlssfa9xdw8pkn9jeca5htq5j8nqzgdct7"
        );
        assert_eq!(
            hex::encode(bucket.merkle_root),
            "ed53a0e55127589f7ed144e44dd2ce09d564b2e6b2e3b3cd864d81ad866f8e3a"
        );
        assert_eq!(
            hex::encode(bucket.tap_tweak),
            "f3385a4bf4e68a91f525b1386425ecb655a6b36a9e7e3392b885fc88c2bda1d3"
        );
        assert_eq!(
            hex::encode(bucket.tweaked_pubkey.serialize()),
            "c4b4fbbcfe549307f03c3a23a1deee6fe104f4a66b8e1b4cb2ce3b4bac1491e6"
        );
        assert!(bucket.control_block().is_some());
    }

    #[test]
    fn test_bucket_address_network_prefix() {
        let bucket =
            derive_bucket_address(&key(K1), &key(K2), 4320, BitcoinNetwork::Testnet).unwrap();
        assert_eq!(
            bucket.address.to_string(),
            "tb1pcj60h0872jfs0upu8g36rhhwdlssfa9xdw8pkn9jeca5htq5j8nq03877y"
        );
    }

    #[test]
    fn test_bucket_derivation_is_deterministic() {
        let a = derive_bucket_address(&key(K1), &key(K3), 1008, BitcoinNetwork::Regtest).unwrap();
        let b = derive_bucket_address(&key(K1), &key(K3), 1008, BitcoinNetwork::Regtest).unwrap();
        assert_eq!(a.to_info(), b.to_info());
    }

    #[test]
    fn test_lock_time_changes_address() {
        let a = derive_bucket_address(&key(K1), &key(K2), 4320, BitcoinNetwork::Regtest).unwrap();
        let b = derive_bucket_address(&key(K1), &key(K2), 4321, BitcoinNetwork::Regtest).unwrap();
        assert_ne!(a.address, b.address);
        assert_ne!(a.merkle_root, b.merkle_root);
    }

    #[test]
    fn test_lock_time_out_of_range() {
        let err = derive_bucket_address(&key(K1), &key(K2), 0x1_0000, BitcoinNetwork::Regtest)
            .unwrap_err();
        assert!(matches!(err, TaprootError::InvalidLockTime(0x1_0000)));

        assert!(
            derive_bucket_address(&key(K1), &key(K2), 0xFFFF, BitcoinNetwork::Regtest).is_ok()
        );
    }

    #[test]
    fn test_wallet_address_internal_key() {
        let internal = WalletKeyType::Internal;
        let regtest = derive_wallet_address(&key(K3), BitcoinNetwork::Regtest, internal);
        let mainnet = derive_wallet_address(&key(K3), BitcoinNetwork::Mainnet, internal);
        assert_eq!(
            regtest.to_string(),
            "bcrt1pgxxyvcmdncdxs06cudd5yvmwwahaesaj6n3eu7st7x4sw9hrchaqg4dc89"
        );
        assert_eq!(
            mainnet.to_string(),
            "bc1pgxxyvcmdncdxs06cudd5yvmwwahaesaj6n3eu7st7x4sw9hrchaqjy33gs"
        );
    }

    #[test]
    fn test_wallet_address_tweaked_key() {
        let address =
            x_only_hex_to_p2tr(K3, BitcoinNetwork::Regtest, WalletKeyType::Tweaked).unwrap();
        assert_eq!(
            address.to_string(),
            "bcrt1plycg5qvjtrp3qjf5f7zl382j9x6nrjz9sdhenvyxq8c3808qxmusreqgad"
        );
    }

    #[test]
    fn test_tweaked_key_from_bucket_address() {
        let bucket =
            derive_bucket_address(&key(K1), &key(K2), 4320, BitcoinNetwork::Regtest).unwrap();
        let recovered =
            tweaked_key_from_address(&bucket.address.to_string(), BitcoinNetwork::Regtest).unwrap();
        assert_eq!(recovered, bucket.tweaked_pubkey);
    }

    #[test]
    fn test_tweaked_key_rejects_other_address_kinds() {
        let segwit_v0 = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
        assert!(matches!(
            tweaked_key_from_address(segwit_v0, BitcoinNetwork::Testnet),
            Err(TaprootError::NotTaproot(_))
        ));

        let regtest_bucket = "bcrt1pcj60h0872jfs0upu8g36rhhwdlssfa9xdw8pkn9jeca5htq5j8nqzgdct7";
        assert!(matches!(
            tweaked_key_from_address(regtest_bucket, BitcoinNetwork::Testnet),
            Err(TaprootError::InvalidAddress(_))
        ));
    }
}
