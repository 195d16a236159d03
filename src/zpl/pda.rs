//! Program Derived Addresses
//!
//! Seeds are ASCII and case-sensitive. The deployed programs re-derive every
//! address passed to them, so each seed set here must match theirs byte for
//! byte.

use solana_sdk::pubkey::Pubkey;

use super::ZplProgramIds;

// ============================================================================
// Constants
// ============================================================================

/// Seed strings shared with the deployed programs
pub mod seeds {
    pub const CONFIGURATION: &[u8] = b"configuration";
    pub const CPI_IDENTITY: &[u8] = b"cpi-identity";
    pub const HOT_RESERVE_BUCKET: &[u8] = b"hot-reserve-bucket";
    pub const INTERACTION: &[u8] = b"interaction";
    pub const GUARDIAN_SETTING: &[u8] = b"guardian-setting";
    pub const SPL_TOKEN_VAULT_AUTHORITY: &[u8] = b"spl-token-vault-authority";
    pub const POSITION: &[u8] = b"position";
    pub const WITHDRAWAL_REQUEST: &[u8] = b"withdrawal-request";
}

/// Maximum length of a single seed
pub const MAX_SEED_LEN: usize = 32;

/// Maximum number of seeds (the bump is appended as one more)
pub const MAX_SEEDS: usize = 16;

/// Classic SPL token program
pub const TOKEN_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Associated Token Account program ID
pub const ATA_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

// ============================================================================
// Derivation
// ============================================================================

/// Canonical bump search with seed validation
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), PdaError> {
    if seeds.len() >= MAX_SEEDS {
        return Err(PdaError::TooManySeeds(seeds.len()));
    }
    if let Some((index, seed)) = seeds.iter().enumerate().find(|(_, s)| s.len() > MAX_SEED_LEN) {
        return Err(PdaError::InvalidSeed {
            index,
            len: seed.len(),
        });
    }

    Pubkey::try_find_program_address(seeds, program_id).ok_or(PdaError::NoViableBump)
}

/// Four-byte little-endian seed
pub fn seed_u32_le(value: u64) -> Result<[u8; 4], PdaError> {
    u32::try_from(value)
        .map(u32::to_le_bytes)
        .map_err(|_| PdaError::SeedOverflow(value))
}

/// Associated token account for `owner` holding `mint`
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey, PdaError> {
    find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}

/// Derives every PDA the bucket and liquidity flows touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAddressDeriver {
    two_way_peg: Pubkey,
    liquidity_management: Pubkey,
}

impl ProgramAddressDeriver {
    pub fn new(program_ids: &ZplProgramIds) -> Self {
        Self {
            two_way_peg: program_ids.two_way_peg,
            liquidity_management: program_ids.liquidity_management,
        }
    }

    pub fn two_way_peg_program_id(&self) -> &Pubkey {
        &self.two_way_peg
    }

    pub fn liquidity_management_program_id(&self) -> &Pubkey {
        &self.liquidity_management
    }

    /// Two-way-peg configuration singleton
    pub fn configuration(&self) -> Result<(Pubkey, u8), PdaError> {
        find_program_address(&[seeds::CONFIGURATION], &self.two_way_peg)
    }

    /// Identity the two-way-peg program signs CPIs with
    pub fn cpi_identity(&self) -> Result<(Pubkey, u8), PdaError> {
        find_program_address(&[seeds::CPI_IDENTITY], &self.two_way_peg)
    }

    /// Bucket keyed by the user's Bitcoin x-only key
    pub fn hot_reserve_bucket(&self, bitcoin_x_only: &[u8; 32]) -> Result<(Pubkey, u8), PdaError> {
        find_program_address(&[seeds::HOT_RESERVE_BUCKET, bitcoin_x_only], &self.two_way_peg)
    }

    pub fn interaction(&self, seed1: &[u8], seed2: u64) -> Result<(Pubkey, u8), PdaError> {
        let seed2 = seed_u32_le(seed2)?;
        find_program_address(&[seeds::INTERACTION, seed1, &seed2], &self.two_way_peg)
    }

    pub fn withdrawal_request(
        &self,
        receiver_address: &[u8],
        seed: u64,
    ) -> Result<(Pubkey, u8), PdaError> {
        let seed = seed_u32_le(seed)?;
        find_program_address(
            &[seeds::WITHDRAWAL_REQUEST, receiver_address, &seed],
            &self.two_way_peg,
        )
    }

    /// Liquidity-management configuration singleton
    pub fn liquidity_management_configuration(&self) -> Result<(Pubkey, u8), PdaError> {
        find_program_address(&[seeds::CONFIGURATION], &self.liquidity_management)
    }

    /// Liquidity-management guardian setting mirroring a two-way-peg one
    pub fn lm_guardian_setting(
        &self,
        two_way_peg_guardian_setting: &Pubkey,
    ) -> Result<(Pubkey, u8), PdaError> {
        find_program_address(
            &[seeds::GUARDIAN_SETTING, two_way_peg_guardian_setting.as_ref()],
            &self.liquidity_management,
        )
    }

    pub fn spl_token_vault_authority(
        &self,
        two_way_peg_guardian_setting: &Pubkey,
    ) -> Result<(Pubkey, u8), PdaError> {
        find_program_address(
            &[
                seeds::SPL_TOKEN_VAULT_AUTHORITY,
                two_way_peg_guardian_setting.as_ref(),
            ],
            &self.liquidity_management,
        )
    }

    /// User position; `None` derives the guardian-level position
    pub fn position(
        &self,
        lm_guardian_setting: &Pubkey,
        user: Option<&Pubkey>,
    ) -> Result<(Pubkey, u8), PdaError> {
        let user: &[u8] = match user {
            Some(user) => user.as_ref(),
            None => &[],
        };
        find_program_address(
            &[seeds::POSITION, lm_guardian_setting.as_ref(), user],
            &self.liquidity_management,
        )
    }
}

/// PDA errors
#[derive(Debug, thiserror::Error)]
pub enum PdaError {
    #[error("seed {index} is {len} bytes, max is 32")]
    InvalidSeed { index: usize, len: usize },

    #[error("too many seeds: {0}")]
    TooManySeeds(usize),

    #[error("seed value {0} does not fit in 4 bytes")]
    SeedOverflow(u64),

    #[error("no off-curve address for any bump")]
    NoViableBump,
}
