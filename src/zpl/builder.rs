//! Instruction Builder
//!
//! The programs read accounts by position, so every list below is ordered
//! exactly as the on-chain handler expects it.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};
use tracing::debug;

use super::instruction::{AmountArgs, ZplInstruction};
use super::pda::{
    associated_token_address, ProgramAddressDeriver, ATA_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use super::{InstructionError, ZplProgramIds};

/// Accounts for opening a bucket, besides the PDAs derived here
#[derive(Debug, Clone)]
pub struct CreateHotReserveBucketParams {
    /// Tweaked output key of the bucket's Taproot address (bucket seed)
    pub hot_reserve_x_only_public_key: [u8; 32],
    /// User's Bitcoin x-only key for the timelocked leaf
    pub script_path_spend_public_key: [u8; 32],
    pub lock_time: u64,
    /// Seconds until the bucket expires
    pub validity_period: u64,
    pub guardian_setting: Pubkey,
    pub guardian_certificate: Pubkey,
    pub cold_reserve_bucket: Pubkey,
    pub layer_fee_collector: Pubkey,
}

/// Withdrawal request to a Taproot receiver
#[derive(Debug, Clone)]
pub struct AddWithdrawalRequestParams {
    /// Tweaked x-only key of the receiving address
    pub receiver_address: [u8; 32],
    pub amount: u64,
    /// Request seed, also written as the request's slot
    pub request_seed: u64,
    pub guardian_setting: Pubkey,
    pub layer_fee_collector: Pubkey,
}

/// Builds two-way-peg and liquidity-management instructions for one wallet
#[derive(Debug, Clone)]
pub struct ZplInstructionBuilder {
    program_ids: ZplProgramIds,
    pdas: ProgramAddressDeriver,
    wallet: Option<Pubkey>,
}

impl ZplInstructionBuilder {
    pub fn new(program_ids: ZplProgramIds, wallet: Option<Pubkey>) -> Self {
        Self {
            pdas: ProgramAddressDeriver::new(&program_ids),
            program_ids,
            wallet,
        }
    }

    pub fn program_ids(&self) -> &ZplProgramIds {
        &self.program_ids
    }

    pub fn pdas(&self) -> &ProgramAddressDeriver {
        &self.pdas
    }

    pub fn wallet(&self) -> Option<Pubkey> {
        self.wallet
    }

    pub fn set_wallet(&mut self, wallet: Option<Pubkey>) {
        self.wallet = wallet;
    }

    fn require_wallet(&self) -> Result<Pubkey, InstructionError> {
        self.wallet.ok_or(InstructionError::WalletNotConnected)
    }

    // ========================================================================
    // Two-Way-Peg
    // ========================================================================

    pub fn create_hot_reserve_bucket(
        &self,
        params: &CreateHotReserveBucketParams,
    ) -> Result<Instruction, InstructionError> {
        let payer = self.require_wallet()?;
        let (configuration, _) = self.pdas.configuration()?;
        let (bucket, _) = self
            .pdas
            .hot_reserve_bucket(&params.hot_reserve_x_only_public_key)?;

        let data = ZplInstruction::create_hot_reserve_bucket(
            params.script_path_spend_public_key,
            params.lock_time,
            params.validity_period,
        )?
        .encode()?;

        let accounts = vec![
            AccountMeta::new(payer, true),
            AccountMeta::new_readonly(configuration, false),
            AccountMeta::new_readonly(params.guardian_setting, false),
            AccountMeta::new_readonly(params.guardian_certificate, false),
            AccountMeta::new_readonly(params.cold_reserve_bucket, false),
            AccountMeta::new(bucket, false),
            AccountMeta::new(params.layer_fee_collector, false),
            AccountMeta::new(system_program::ID, false),
        ];

        debug!(bucket = %bucket, payer = %payer, "Assembled create bucket instruction");

        Ok(Instruction {
            program_id: self.program_ids.two_way_peg,
            accounts,
            data,
        })
    }

    /// Extend an existing bucket's expiry
    pub fn reactivate_hot_reserve_bucket(
        &self,
        bucket: &Pubkey,
        layer_fee_collector: &Pubkey,
        validity_period: u64,
    ) -> Result<Instruction, InstructionError> {
        let wallet = self.require_wallet()?;
        let (configuration, _) = self.pdas.configuration()?;

        let data = ZplInstruction::reactivate_hot_reserve_bucket(validity_period)?.encode()?;

        let accounts = vec![
            AccountMeta::new(wallet, true),
            AccountMeta::new_readonly(configuration, false),
            AccountMeta::new(*bucket, false),
            AccountMeta::new(*layer_fee_collector, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ];

        Ok(Instruction {
            program_id: self.program_ids.two_way_peg,
            accounts,
            data,
        })
    }

    pub fn add_withdrawal_request(
        &self,
        params: &AddWithdrawalRequestParams,
    ) -> Result<Instruction, InstructionError> {
        let payer = self.require_wallet()?;
        let (cpi_identity, _) = self.pdas.cpi_identity()?;
        let (configuration, _) = self.pdas.configuration()?;
        let (lm_guardian_setting, _) = self.pdas.lm_guardian_setting(&params.guardian_setting)?;
        let (withdrawal_request, _) = self
            .pdas
            .withdrawal_request(&params.receiver_address, params.request_seed)?;
        let (interaction, _) = self
            .pdas
            .interaction(&params.receiver_address, params.request_seed)?;
        let (position, _) = self.pdas.position(&lm_guardian_setting, Some(&payer))?;
        let (lm_configuration, _) = self.pdas.liquidity_management_configuration()?;

        let data = ZplInstruction::add_withdrawal_request(
            params.receiver_address,
            params.request_seed,
            params.amount,
        )
        .encode()?;

        let accounts = vec![
            AccountMeta::new(payer, true),
            AccountMeta::new_readonly(cpi_identity, false),
            AccountMeta::new_readonly(configuration, false),
            AccountMeta::new_readonly(params.guardian_setting, false),
            AccountMeta::new_readonly(lm_guardian_setting, false),
            AccountMeta::new(withdrawal_request, false),
            AccountMeta::new(interaction, false),
            AccountMeta::new(position, false),
            AccountMeta::new(params.layer_fee_collector, false),
            AccountMeta::new_readonly(lm_configuration, false),
            AccountMeta::new_readonly(self.program_ids.liquidity_management, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ];

        debug!(
            withdrawal_request = %withdrawal_request,
            amount = params.amount,
            "Assembled withdrawal request instruction"
        );

        Ok(Instruction {
            program_id: self.program_ids.two_way_peg,
            accounts,
            data,
        })
    }

    // ========================================================================
    // Liquidity Management
    // ========================================================================

    /// Move zBTC from the guardian vault back to the wallet
    pub fn retrieve(
        &self,
        amount: u64,
        guardian_setting: &Pubkey,
    ) -> Result<Instruction, InstructionError> {
        let wallet = self.require_wallet()?;
        let mint = self.program_ids.asset_mint;
        let (lm_guardian_setting, _) = self.pdas.lm_guardian_setting(guardian_setting)?;
        let (position, _) = self.pdas.position(&lm_guardian_setting, Some(&wallet))?;
        let (vault_authority, _) = self.pdas.spl_token_vault_authority(guardian_setting)?;
        let user_ata = associated_token_address(&wallet, &mint)?;
        let vault_ata = associated_token_address(&vault_authority, &mint)?;

        let data = ZplInstruction::Retrieve(AmountArgs { amount }).encode()?;

        let accounts = vec![
            AccountMeta::new(wallet, true),
            AccountMeta::new(user_ata, false),
            AccountMeta::new(position, false),
            AccountMeta::new_readonly(lm_guardian_setting, false),
            AccountMeta::new_readonly(vault_authority, false),
            AccountMeta::new(vault_ata, false),
            AccountMeta::new_readonly(mint, false),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(ATA_PROGRAM_ID, false),
        ];

        Ok(Instruction {
            program_id: self.program_ids.liquidity_management,
            accounts,
            data,
        })
    }

    /// Move zBTC from the wallet into the guardian vault
    pub fn store(
        &self,
        amount: u64,
        guardian_setting: &Pubkey,
    ) -> Result<Instruction, InstructionError> {
        let wallet = self.require_wallet()?;
        let mint = self.program_ids.asset_mint;
        let (lm_configuration, _) = self.pdas.liquidity_management_configuration()?;
        let (lm_guardian_setting, _) = self.pdas.lm_guardian_setting(guardian_setting)?;
        let (position, _) = self.pdas.position(&lm_guardian_setting, Some(&wallet))?;
        let (vault_authority, _) = self.pdas.spl_token_vault_authority(guardian_setting)?;
        let user_ata = associated_token_address(&wallet, &mint)?;
        let vault_ata = associated_token_address(&vault_authority, &mint)?;

        let data = ZplInstruction::Store(AmountArgs { amount }).encode()?;

        let accounts = vec![
            AccountMeta::new(wallet, true),
            AccountMeta::new(user_ata, false),
            AccountMeta::new(position, false),
            AccountMeta::new_readonly(lm_configuration, false),
            AccountMeta::new_readonly(lm_guardian_setting, false),
            AccountMeta::new_readonly(*guardian_setting, false),
            AccountMeta::new_readonly(vault_authority, false),
            AccountMeta::new(vault_ata, false),
            AccountMeta::new_readonly(mint, false),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ];

        Ok(Instruction {
            program_id: self.program_ids.liquidity_management,
            accounts,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_ids() -> ZplProgramIds {
        ZplProgramIds {
            two_way_peg: Pubkey::new_from_array([42u8; 32]),
            liquidity_management: Pubkey::new_from_array([43u8; 32]),
            asset_mint: Pubkey::new_from_array([44u8; 32]),
        }
    }

    fn create_params() -> CreateHotReserveBucketParams {
        CreateHotReserveBucketParams {
            hot_reserve_x_only_public_key: [6u8; 32],
            script_path_spend_public_key: [5u8; 32],
            lock_time: 4320,
            validity_period: 2_592_000,
            guardian_setting: Pubkey::new_unique(),
            guardian_certificate: Pubkey::new_unique(),
            cold_reserve_bucket: Pubkey::new_unique(),
            layer_fee_collector: Pubkey::new_unique(),
        }
    }

    fn flags(ix: &Instruction) -> Vec<(bool, bool)> {
        ix.accounts.iter().map(|m| (m.is_signer, m.is_writable)).collect()
    }

    #[test]
    fn test_requires_wallet() {
        let builder = ZplInstructionBuilder::new(program_ids(), None);
        let guardian = Pubkey::new_unique();

        assert!(matches!(
            builder.create_hot_reserve_bucket(&create_params()),
            Err(InstructionError::WalletNotConnected)
        ));
        assert!(matches!(
            builder.store(1, &guardian),
            Err(InstructionError::WalletNotConnected)
        ));
        assert!(matches!(
            builder.reactivate_hot_reserve_bucket(&guardian, &guardian, 1),
            Err(InstructionError::WalletNotConnected)
        ));
    }

    #[test]
    fn test_create_bucket_account_order() {
        let wallet = Pubkey::new_unique();
        let builder = ZplInstructionBuilder::new(program_ids(), Some(wallet));
        let params = create_params();
        let ix = builder.create_hot_reserve_bucket(&params).unwrap();

        let (configuration, _) = builder.pdas().configuration().unwrap();
        let (bucket, _) = builder.pdas().hot_reserve_bucket(&[6u8; 32]).unwrap();
        let keys: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();

        assert_eq!(ix.program_id, program_ids().two_way_peg);
        assert_eq!(
            keys,
            vec![
                wallet,
                configuration,
                params.guardian_setting,
                params.guardian_certificate,
                params.cold_reserve_bucket,
                bucket,
                params.layer_fee_collector,
                system_program::ID,
            ]
        );
        assert_eq!(
            flags(&ix),
            vec![
                (true, true),
                (false, false),
                (false, false),
                (false, false),
                (false, false),
                (false, true),
                (false, true),
                (false, true),
            ]
        );
        assert_eq!(ix.data[0], 5);
    }

    #[test]
    fn test_create_bucket_seeded_by_taproot_output_key() {
        use crate::keys::{parse_x_only_pubkey, BitcoinNetwork};
        use crate::taproot::derive_bucket_address;

        let guardian_key = parse_x_only_pubkey(
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        )
        .unwrap();
        let user_key = parse_x_only_pubkey(
            "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5",
        )
        .unwrap();
        let derived =
            derive_bucket_address(&guardian_key, &user_key, 4320, BitcoinNetwork::Regtest).unwrap();

        let builder = ZplInstructionBuilder::new(program_ids(), Some(Pubkey::new_unique()));
        let params = CreateHotReserveBucketParams {
            hot_reserve_x_only_public_key: derived.tweaked_pubkey.serialize(),
            script_path_spend_public_key: user_key.serialize(),
            ..create_params()
        };
        let ix = builder.create_hot_reserve_bucket(&params).unwrap();

        let (expected, _) = Pubkey::find_program_address(
            &[b"hot-reserve-bucket", &derived.tweaked_pubkey.serialize()],
            &program_ids().two_way_peg,
        );
        let (user_seeded, _) = Pubkey::find_program_address(
            &[b"hot-reserve-bucket", &user_key.serialize()],
            &program_ids().two_way_peg,
        );
        assert_eq!(ix.accounts[5].pubkey, expected);
        assert_ne!(ix.accounts[5].pubkey, user_seeded);

        let decoded = ZplInstruction::decode(&ix.data).unwrap();
        assert!(matches!(
            decoded,
            ZplInstruction::CreateHotReserveBucket(args)
                if args.script_path_spend_public_key == user_key.serialize()
        ));
    }

    #[test]
    fn test_create_bucket_validity_overflow() {
        let builder = ZplInstructionBuilder::new(program_ids(), Some(Pubkey::new_unique()));
        let mut params = create_params();
        params.validity_period = u64::MAX;

        assert!(matches!(
            builder.create_hot_reserve_bucket(&params),
            Err(InstructionError::Codec(_))
        ));
    }

    #[test]
    fn test_reactivate_account_order() {
        let wallet = Pubkey::new_unique();
        let bucket = Pubkey::new_unique();
        let fee_collector = Pubkey::new_unique();
        let builder = ZplInstructionBuilder::new(program_ids(), Some(wallet));
        let ix = builder
            .reactivate_hot_reserve_bucket(&bucket, &fee_collector, 86_400)
            .unwrap();

        assert_eq!(ix.accounts.len(), 5);
        assert_eq!(ix.accounts[0].pubkey, wallet);
        assert_eq!(ix.accounts[2].pubkey, bucket);
        assert_eq!(ix.accounts[3].pubkey, fee_collector);
        assert_eq!(
            flags(&ix),
            vec![(true, true), (false, false), (false, true), (false, true), (false, false)]
        );
        assert_eq!(ix.data, vec![7, 0x80, 0x51, 0x01, 0x00]);
    }

    #[test]
    fn test_withdrawal_request_account_order() {
        let wallet = Pubkey::new_unique();
        let builder = ZplInstructionBuilder::new(program_ids(), Some(wallet));
        let params = AddWithdrawalRequestParams {
            receiver_address: [8u8; 32],
            amount: 25_000,
            request_seed: 1_700_000_000,
            guardian_setting: Pubkey::new_unique(),
            layer_fee_collector: Pubkey::new_unique(),
        };
        let ix = builder.add_withdrawal_request(&params).unwrap();
        let pdas = builder.pdas();

        let (lm_guardian, _) = pdas.lm_guardian_setting(&params.guardian_setting).unwrap();
        let (request, _) = pdas.withdrawal_request(&[8u8; 32], 1_700_000_000).unwrap();
        let (position, _) = pdas.position(&lm_guardian, Some(&wallet)).unwrap();

        assert_eq!(ix.program_id, program_ids().two_way_peg);
        assert_eq!(ix.accounts.len(), 12);
        assert_eq!(ix.accounts[1].pubkey, pdas.cpi_identity().unwrap().0);
        assert_eq!(ix.accounts[4].pubkey, lm_guardian);
        assert_eq!(ix.accounts[5].pubkey, request);
        assert_eq!(ix.accounts[7].pubkey, position);
        assert_eq!(ix.accounts[10].pubkey, program_ids().liquidity_management);
        assert_eq!(
            flags(&ix).iter().filter(|(_, writable)| *writable).count(),
            5
        );
        assert_eq!(ix.data[0], 18);
        assert_eq!(ix.data[33..41], 1_700_000_000u64.to_le_bytes());
    }

    #[test]
    fn test_withdrawal_seed_must_fit_four_bytes() {
        let builder = ZplInstructionBuilder::new(program_ids(), Some(Pubkey::new_unique()));
        let params = AddWithdrawalRequestParams {
            receiver_address: [8u8; 32],
            amount: 1,
            request_seed: u64::from(u32::MAX) + 1,
            guardian_setting: Pubkey::new_unique(),
            layer_fee_collector: Pubkey::new_unique(),
        };
        assert!(matches!(
            builder.add_withdrawal_request(&params),
            Err(InstructionError::Pda(_))
        ));
    }

    #[test]
    fn test_store_and_retrieve_accounts() {
        let wallet = Pubkey::new_unique();
        let guardian = Pubkey::new_unique();
        let builder = ZplInstructionBuilder::new(program_ids(), Some(wallet));
        let mint = program_ids().asset_mint;

        let store = builder.store(1_000, &guardian).unwrap();
        let retrieve = builder.retrieve(1_000, &guardian).unwrap();
        let user_ata = associated_token_address(&wallet, &mint).unwrap();

        assert_eq!(store.program_id, program_ids().liquidity_management);
        assert_eq!(store.accounts.len(), 11);
        assert_eq!(store.accounts[1].pubkey, user_ata);
        assert_eq!(store.accounts[5].pubkey, guardian);
        assert_eq!(store.accounts[10].pubkey, TOKEN_PROGRAM_ID);
        assert_eq!(store.data[0], 10);

        assert_eq!(retrieve.accounts.len(), 10);
        assert_eq!(retrieve.accounts[1].pubkey, user_ata);
        assert_eq!(retrieve.accounts[6].pubkey, mint);
        assert_eq!(retrieve.accounts[9].pubkey, ATA_PROGRAM_ID);
        assert_eq!(retrieve.data[0], 9);
        assert!(retrieve.accounts[0].is_signer);
    }
}
