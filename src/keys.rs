//! Bitcoin Key Material
//!
//! Network selection and x-only public key handling shared by the Taproot
//! deriver, the deposit builder and the ZPL program client.
//!
//! A Bitcoin x-only key is always 32 bytes. The 33-byte compressed form only
//! appears at the wallet boundary and is converted here before it reaches
//! any derivation or on-chain seed.

use std::fmt;
use std::str::FromStr;

use bitcoin::key::{CompressedPublicKey, Keypair, Secp256k1};
use bitcoin::secp256k1::{self, SecretKey};
use bitcoin::{Address, Network, PublicKey, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

/// Length of an x-only public key
pub const X_ONLY_PUBKEY_LEN: usize = 32;

/// Bitcoin networks the bridge is deployed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitcoinNetwork {
    Mainnet,
    Testnet,
    Regtest,
}

impl BitcoinNetwork {
    /// Chain parameters for this network
    pub fn to_network(self) -> Network {
        match self {
            BitcoinNetwork::Mainnet => Network::Bitcoin,
            BitcoinNetwork::Testnet => Network::Testnet,
            BitcoinNetwork::Regtest => Network::Regtest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BitcoinNetwork::Mainnet => "mainnet",
            BitcoinNetwork::Testnet => "testnet",
            BitcoinNetwork::Regtest => "regtest",
        }
    }
}

impl fmt::Display for BitcoinNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BitcoinNetwork {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "bitcoin" | "main" => Ok(BitcoinNetwork::Mainnet),
            "testnet" | "test" => Ok(BitcoinNetwork::Testnet),
            "regtest" => Ok(BitcoinNetwork::Regtest),
            _ => Err(KeyError::UnsupportedNetwork(s.to_string())),
        }
    }
}

impl TryFrom<Network> for BitcoinNetwork {
    type Error = KeyError;

    fn try_from(network: Network) -> Result<Self, Self::Error> {
        match network {
            Network::Bitcoin => Ok(BitcoinNetwork::Mainnet),
            Network::Testnet => Ok(BitcoinNetwork::Testnet),
            Network::Regtest => Ok(BitcoinNetwork::Regtest),
            other => Err(KeyError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl From<BitcoinNetwork> for Network {
    fn from(network: BitcoinNetwork) -> Self {
        network.to_network()
    }
}

/// Parse an x-only public key from raw bytes
pub fn x_only_from_bytes(bytes: &[u8]) -> Result<XOnlyPublicKey, KeyError> {
    if bytes.len() != X_ONLY_PUBKEY_LEN {
        return Err(KeyError::InvalidLength {
            expected: X_ONLY_PUBKEY_LEN,
            actual: bytes.len(),
        });
    }
    XOnlyPublicKey::from_slice(bytes).map_err(|e| KeyError::InvalidKey(e.to_string()))
}

/// Parse x-only public key from hex string
pub fn parse_x_only_pubkey(hex_str: &str) -> Result<XOnlyPublicKey, KeyError> {
    let bytes = hex::decode(hex_str).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
    x_only_from_bytes(&bytes)
}

/// Convert a wallet-reported public key (hex) to its x-only form.
///
/// Accepts a 33-byte compressed key, a 65-byte uncompressed key, or a key
/// that is already x-only.
pub fn x_only_from_wallet_pubkey_hex(hex_str: &str) -> Result<XOnlyPublicKey, KeyError> {
    let bytes = hex::decode(hex_str).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
    if bytes.len() == X_ONLY_PUBKEY_LEN {
        return x_only_from_bytes(&bytes);
    }
    let public_key =
        PublicKey::from_slice(&bytes).map_err(|e| KeyError::InvalidKey(e.to_string()))?;
    Ok(public_key.inner.x_only_public_key().0)
}

/// Message a Solana wallet signs to seed its companion Bitcoin wallet.
///
/// The text is part of the derivation: changing a single character yields a
/// different Bitcoin key for every user.
pub fn wallet_derivation_message(solana_pubkey: &Pubkey) -> String {
    format!(
        "By proceeding, you are authorizing the generation of a Testnet address based on the \
         Solana wallet you've connected. This process does not charge any fees. Connected \
         Solana wallet address:{}",
        solana_pubkey
    )
}

/// Bitcoin wallet seeded from a Solana message signature
pub struct DerivedBitcoinWallet {
    keypair: Keypair,
    /// Internal x-only key (script-path key for the user's buckets)
    pub x_only_public_key: XOnlyPublicKey,
    /// Compressed public key, hex
    pub public_key_hex: String,
    pub p2tr: Address,
    pub p2wpkh: Address,
    pub p2pkh: Address,
    pub network: BitcoinNetwork,
}

impl DerivedBitcoinWallet {
    /// Keypair handed to the external signing capability
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl fmt::Debug for DerivedBitcoinWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedBitcoinWallet")
            .field("x_only_public_key", &self.x_only_public_key)
            .field("p2tr", &self.p2tr.to_string())
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Derive the user's Bitcoin wallet from a signature over
/// [`wallet_derivation_message`]. The secret key is `SHA256(signature)`.
pub fn derive_bitcoin_wallet(
    signature: &[u8],
    network: BitcoinNetwork,
) -> Result<DerivedBitcoinWallet, KeyError> {
    if signature.is_empty() {
        return Err(KeyError::InvalidSecret);
    }

    let seed: [u8; 32] = Sha256::digest(signature).into();
    let secret_key = SecretKey::from_slice(&seed).map_err(|_| KeyError::InvalidSecret)?;

    let secp = Secp256k1::new();
    let keypair = Keypair::from_secret_key(&secp, &secret_key);
    let (x_only_public_key, _parity) = keypair.x_only_public_key();
    let compressed = CompressedPublicKey(keypair.public_key());

    let chain = network.to_network();
    let p2tr = Address::p2tr(&secp, x_only_public_key, None, chain);
    let p2wpkh = Address::p2wpkh(&compressed, chain);
    let p2pkh = Address::p2pkh(compressed.pubkey_hash(), chain);

    Ok(DerivedBitcoinWallet {
        keypair,
        x_only_public_key,
        public_key_hex: hex::encode(compressed.to_bytes()),
        p2tr,
        p2wpkh,
        p2pkh,
        network,
    })
}

/// Errors for key material handling
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("unsupported bitcoin network: {0}")]
    UnsupportedNetwork(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signature does not yield a valid secret key")]
    InvalidSecret,
}

impl From<secp256k1::Error> for KeyError {
    fn from(e: secp256k1::Error) -> Self {
        KeyError::InvalidKey(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G_X: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_network_parsing() {
        assert_eq!("regtest".parse::<BitcoinNetwork>().unwrap(), BitcoinNetwork::Regtest);
        assert_eq!("Testnet".parse::<BitcoinNetwork>().unwrap(), BitcoinNetwork::Testnet);
        assert_eq!("bitcoin".parse::<BitcoinNetwork>().unwrap(), BitcoinNetwork::Mainnet);
        assert!(matches!(
            "signet".parse::<BitcoinNetwork>(),
            Err(KeyError::UnsupportedNetwork(_))
        ));
    }

    #[test]
    fn test_signet_is_unsupported() {
        assert!(BitcoinNetwork::try_from(Network::Signet).is_err());
        assert_eq!(
            BitcoinNetwork::try_from(Network::Regtest).unwrap(),
            BitcoinNetwork::Regtest
        );
    }

    #[test]
    fn test_parse_x_only_pubkey() {
        let key = parse_x_only_pubkey(G_X).unwrap();
        assert_eq!(hex::encode(key.serialize()), G_X);

        let err = parse_x_only_pubkey(&format!("02{}", G_X)).unwrap_err();
        assert!(matches!(err, KeyError::InvalidLength { expected: 32, actual: 33 }));

        assert!(matches!(parse_x_only_pubkey("zz"), Err(KeyError::InvalidHex(_))));
    }

    #[test]
    fn test_x_only_from_compressed_key() {
        let even = x_only_from_wallet_pubkey_hex(&format!("02{}", G_X)).unwrap();
        let odd = x_only_from_wallet_pubkey_hex(&format!("03{}", G_X));
        assert_eq!(hex::encode(even.serialize()), G_X);
        // parity is dropped
        assert_eq!(odd.unwrap(), even);

        let already_x_only = x_only_from_wallet_pubkey_hex(G_X).unwrap();
        assert_eq!(already_x_only, even);
    }

    #[test]
    fn test_derive_bitcoin_wallet_deterministic() {
        let signature = [7u8; 64];
        let a = derive_bitcoin_wallet(&signature, BitcoinNetwork::Regtest).unwrap();
        let b = derive_bitcoin_wallet(&signature, BitcoinNetwork::Regtest).unwrap();

        assert_eq!(a.x_only_public_key, b.x_only_public_key);
        assert_eq!(a.p2tr, b.p2tr);
        assert!(a.p2tr.to_string().starts_with("bcrt1p"));
        assert!(a.p2wpkh.to_string().starts_with("bcrt1q"));
        assert_eq!(a.public_key_hex.len(), 66);
    }

    #[test]
    fn test_derive_bitcoin_wallet_rejects_empty_signature() {
        assert!(matches!(
            derive_bitcoin_wallet(&[], BitcoinNetwork::Testnet),
            Err(KeyError::InvalidSecret)
        ));
    }

    #[test]
    fn test_derivation_message_names_wallet() {
        let pubkey = Pubkey::new_from_array([9u8; 32]);
        let message = wallet_derivation_message(&pubkey);
        assert!(message.ends_with(&format!("address:{}", pubkey)));
    }
}
