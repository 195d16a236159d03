//! Account Discriminators
//!
//! Each account type starts with `SHA256("<namespace>:<type>")[..8]`. The
//! known kinds are precomputed so decoding matches on constants instead of
//! hashing tags at every call site.

use sha2::{Digest, Sha256};

/// Discriminator length
pub const DISCRIMINATOR_LEN: usize = 8;

pub const TWO_WAY_PEG_NAMESPACE: &str = "two-way-peg";
pub const LIQUIDITY_MANAGEMENT_NAMESPACE: &str = "liquidity-management";

/// First 8 bytes of `SHA256("<namespace>:<type_name>")`
pub fn account_discriminator(namespace: &str, type_name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("{}:{}", namespace, type_name).as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

/// Account types this client reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountKind {
    TwoWayPegConfiguration,
    HotReserveBucket,
    Position,
}

impl AccountKind {
    pub const ALL: [AccountKind; 3] = [
        AccountKind::TwoWayPegConfiguration,
        AccountKind::HotReserveBucket,
        AccountKind::Position,
    ];

    pub fn namespace(&self) -> &'static str {
        match self {
            AccountKind::TwoWayPegConfiguration | AccountKind::HotReserveBucket => {
                TWO_WAY_PEG_NAMESPACE
            }
            AccountKind::Position => LIQUIDITY_MANAGEMENT_NAMESPACE,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AccountKind::TwoWayPegConfiguration => "configuration",
            AccountKind::HotReserveBucket => "hot-reserve-bucket",
            AccountKind::Position => "position",
        }
    }

    pub fn discriminator(&self) -> [u8; DISCRIMINATOR_LEN] {
        match self {
            AccountKind::TwoWayPegConfiguration => [58, 239, 111, 204, 77, 230, 52, 224],
            AccountKind::HotReserveBucket => [182, 118, 157, 86, 210, 154, 176, 244],
            AccountKind::Position => [7, 5, 201, 127, 135, 77, 163, 53],
        }
    }

    /// Kind whose discriminator prefixes `data`
    pub fn from_data(data: &[u8]) -> Option<AccountKind> {
        let prefix = data.get(..DISCRIMINATOR_LEN)?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.discriminator() == prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_match_hashed_tags() {
        for kind in AccountKind::ALL {
            assert_eq!(
                kind.discriminator(),
                account_discriminator(kind.namespace(), kind.type_name()),
                "{:?}",
                kind
            );
        }
    }

    #[test]
    fn test_from_data() {
        let mut data = AccountKind::Position.discriminator().to_vec();
        data.extend_from_slice(&[0u8; 16]);
        assert_eq!(AccountKind::from_data(&data), Some(AccountKind::Position));

        assert_eq!(AccountKind::from_data(&[0u8; 32]), None);
        assert_eq!(AccountKind::from_data(&[182, 118]), None);
    }
}
