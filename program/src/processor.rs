use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
    system_program,
    sysvar::{rent::Rent, Sysvar},
};

use crate::{
    error::EscrowError,
    instruction::{AccountSlot, EscrowInstruction, ACCOUNT_LAYOUT_VERSION},
    pda,
    state::{EscrowRecord, InitParams, Release},
    vault::{self, CreateVaultAccounts, VaultSide},
};

pub struct Processor;
impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = EscrowInstruction::unpack(instruction_data)?;
        check_layout(instruction.account_layout(), accounts)?;

        match instruction {
            EscrowInstruction::Initialize => {
                msg!("Instruction: Initialize");
                Self::process_initialize(accounts, program_id)
            }
            EscrowInstruction::FundA { amount } => {
                msg!("Instruction: FundA");
                Self::process_fund(accounts, VaultSide::X, amount, program_id)
            }
            EscrowInstruction::FundB { amount } => {
                msg!("Instruction: FundB");
                Self::process_fund(accounts, VaultSide::Y, amount, program_id)
            }
            EscrowInstruction::Settle => {
                msg!("Instruction: Settle");
                Self::process_settle(accounts, program_id)
            }
            EscrowInstruction::Cancel => {
                msg!("Instruction: Cancel");
                Self::process_cancel(accounts, program_id)
            }
        }
    }

    fn process_initialize(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let escrow_account = next_account_info(account_info_iter)?;
        // alice pays rent for everything created here
        let alice = next_account_info(account_info_iter)?;
        let bob = next_account_info(account_info_iter)?;
        let x_vault = next_account_info(account_info_iter)?;
        let y_vault = next_account_info(account_info_iter)?;
        let x_mint = next_account_info(account_info_iter)?;
        let y_mint = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;
        let rent_program = next_account_info(account_info_iter)?;

        check_token_program(token_program)?;
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        let (escrow_address, escrow_bump) = pda::escrow_address(program_id)?;
        if escrow_address != *escrow_account.key {
            return Err(EscrowError::DerivationMismatch.into());
        }
        if escrow_account.owner == program_id && escrow_account.data_len() == EscrowRecord::LEN {
            let existing = EscrowRecord::unpack_unchecked(&escrow_account.data.borrow())?;
            if existing.is_initialized() {
                return Err(EscrowError::AlreadyInitialized.into());
            }
        }

        let rent = &Rent::from_account_info(rent_program)?;
        vault::create_pda_account(
            alice,
            escrow_account,
            system_program_info,
            rent,
            EscrowRecord::LEN,
            program_id,
            &[pda::ESCROW_SEED, &[escrow_bump]],
        )?;
        if !rent.is_exempt(escrow_account.lamports(), escrow_account.data_len()) {
            return Err(ProgramError::AccountNotRentExempt);
        }

        let vault_x = vault::create_vault(
            VaultSide::X,
            CreateVaultAccounts {
                payer: alice,
                vault: x_vault,
                mint: x_mint,
                authority: escrow_account,
                token_program,
                system_program: system_program_info,
                rent_sysvar: rent_program,
            },
            program_id,
        )?;
        let vault_y = vault::create_vault(
            VaultSide::Y,
            CreateVaultAccounts {
                payer: alice,
                vault: y_vault,
                mint: y_mint,
                authority: escrow_account,
                token_program,
                system_program: system_program_info,
                rent_sysvar: rent_program,
            },
            program_id,
        )?;

        let mut record = EscrowRecord::unpack_unchecked(&escrow_account.data.borrow())?;
        record.initialize(InitParams {
            party_a: *alice.key,
            party_b: *bob.key,
            escrow_bump,
            vault_x,
            vault_y,
        })?;
        EscrowRecord::pack(record, &mut escrow_account.try_borrow_mut_data()?)?;

        msg!("Escrow initialized (account layout v{})", ACCOUNT_LAYOUT_VERSION);
        Ok(())
    }

    fn process_fund(
        accounts: &[AccountInfo],
        side: VaultSide,
        amount: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let escrow_account = next_account_info(account_info_iter)?;
        let depositor = next_account_info(account_info_iter)?;
        let depositor_token_account = next_account_info(account_info_iter)?;
        let vault_account = next_account_info(account_info_iter)?;
        let mint = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        check_token_program(token_program)?;
        let mut record = load_record(escrow_account, program_id)?;

        match side {
            VaultSide::X => record.fund_a(depositor.key, amount)?,
            VaultSide::Y => record.fund_b(depositor.key, amount)?,
        }
        record.verify_vault(side, vault_account.key, program_id)?;
        if mint.key != record.mint_key(side) {
            return Err(EscrowError::MintMismatch.into());
        }
        vault::check_token_account(depositor_token_account, mint.key, depositor.key)?;

        vault::deposit(
            token_program,
            depositor_token_account,
            vault_account,
            depositor,
            amount,
        )?;

        EscrowRecord::pack(record, &mut escrow_account.try_borrow_mut_data()?)?;
        msg!("Escrow funded: {:?} holds {}", side, amount);
        Ok(())
    }

    fn process_settle(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let escrow_account = next_account_info(account_info_iter)?;
        let caller = next_account_info(account_info_iter)?;
        let alice_y_account = next_account_info(account_info_iter)?;
        let bob_x_account = next_account_info(account_info_iter)?;
        let x_vault = next_account_info(account_info_iter)?;
        let y_vault = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        check_token_program(token_program)?;
        let mut record = load_record(escrow_account, program_id)?;
        let releases = record.settle(caller.key)?;

        release_all(
            program_id,
            &record,
            &releases,
            escrow_account,
            (x_vault, bob_x_account),
            (y_vault, alice_y_account),
            token_program,
        )?;

        EscrowRecord::pack(record, &mut escrow_account.try_borrow_mut_data()?)?;
        msg!("Escrow settled");
        Ok(())
    }

    fn process_cancel(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let escrow_account = next_account_info(account_info_iter)?;
        let caller = next_account_info(account_info_iter)?;
        let alice_x_account = next_account_info(account_info_iter)?;
        let bob_y_account = next_account_info(account_info_iter)?;
        let x_vault = next_account_info(account_info_iter)?;
        let y_vault = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        check_token_program(token_program)?;
        let mut record = load_record(escrow_account, program_id)?;
        let releases = record.cancel(caller.key)?;

        release_all(
            program_id,
            &record,
            &releases,
            escrow_account,
            (x_vault, alice_x_account),
            (y_vault, bob_y_account),
            token_program,
        )?;

        EscrowRecord::pack(record, &mut escrow_account.try_borrow_mut_data()?)?;
        msg!("Escrow cancelled");
        Ok(())
    }
}

/// Rejects account lists that are short or miss a signer/writable flag.
fn check_layout(layout: &[AccountSlot], accounts: &[AccountInfo]) -> ProgramResult {
    if accounts.len() < layout.len() {
        return Err(ProgramError::NotEnoughAccountKeys);
    }
    for (slot, account) in layout.iter().zip(accounts) {
        if slot.is_signer && !account.is_signer {
            msg!("Account {} must sign", slot.name);
            return Err(ProgramError::MissingRequiredSignature);
        }
        if slot.is_writable && !account.is_writable {
            msg!("Account {} must be writable", slot.name);
            return Err(EscrowError::AccountNotWritable.into());
        }
    }
    Ok(())
}

fn check_token_program(token_program: &AccountInfo) -> ProgramResult {
    if *token_program.key != spl_token::id() {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

fn load_record(escrow_account: &AccountInfo, program_id: &Pubkey) -> Result<EscrowRecord, ProgramError> {
    if escrow_account.data_is_empty() {
        return Err(EscrowError::InvalidState.into());
    }
    if escrow_account.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }
    let record = EscrowRecord::unpack_unchecked(&escrow_account.data.borrow())?;
    pda::verify(
        pda::ESCROW_SEED,
        record.bump_seeds.escrow,
        program_id,
        escrow_account.key,
    )?;
    Ok(record)
}

/// Empties each vault named in `releases` into its paired token account.
/// `x` and `y` pair each vault with the token account its release goes to.
///
/// A vault holding less than its recorded deposit is refused. Anything above
/// it (tokens sent straight to the vault) leaves with the deposit.
fn release_all<'a>(
    program_id: &Pubkey,
    record: &EscrowRecord,
    releases: &[Release],
    escrow_account: &AccountInfo<'a>,
    x: (&AccountInfo<'a>, &AccountInfo<'a>),
    y: (&AccountInfo<'a>, &AccountInfo<'a>),
    token_program: &AccountInfo<'a>,
) -> ProgramResult {
    record.verify_vault(VaultSide::X, x.0.key, program_id)?;
    record.verify_vault(VaultSide::Y, y.0.key, program_id)?;

    let bump = [record.bump_seeds.escrow];
    let escrow_seeds: &[&[u8]] = &[pda::ESCROW_SEED, &bump];

    for release in releases {
        let (vault_account, destination) = match release.vault {
            VaultSide::X => x,
            VaultSide::Y => y,
        };
        vault::check_token_account(
            destination,
            record.mint_key(release.vault),
            record.party_key(release.to),
        )?;
        let held = vault::balance(vault_account)?;
        if held < release.amount {
            return Err(EscrowError::VaultBalanceMismatch.into());
        }
        if held == 0 {
            continue;
        }
        if held > release.amount {
            msg!("Vault {:?} holds {} above its deposit", release.vault, held - release.amount);
        }
        vault::release(
            token_program,
            vault_account,
            destination,
            escrow_account,
            held,
            escrow_seeds,
        )?;
    }
    Ok(())
}
