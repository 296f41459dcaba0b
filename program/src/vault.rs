//! Vault custody: SPL token accounts at program-derived addresses whose token
//! authority is the escrow record's derived address.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{rent::Rent, Sysvar},
};

use spl_token::state::Account as TokenAccount;

use crate::{error::EscrowError, pda};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VaultSide {
    X,
    Y,
}

impl VaultSide {
    pub fn seed(self) -> &'static [u8] {
        match self {
            VaultSide::X => pda::VAULT_X_SEED,
            VaultSide::Y => pda::VAULT_Y_SEED,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VaultHandle {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub bump: u8,
}

pub struct CreateVaultAccounts<'a, 'info> {
    /// Pays rent for the new vault.
    pub payer: &'a AccountInfo<'info>,
    pub vault: &'a AccountInfo<'info>,
    pub mint: &'a AccountInfo<'info>,
    /// Becomes the vault's token authority.
    pub authority: &'a AccountInfo<'info>,
    pub token_program: &'a AccountInfo<'info>,
    pub system_program: &'a AccountInfo<'info>,
    pub rent_sysvar: &'a AccountInfo<'info>,
}

pub fn create_vault(
    side: VaultSide,
    accounts: CreateVaultAccounts,
    program_id: &Pubkey,
) -> Result<VaultHandle, ProgramError> {
    let (address, bump) = pda::derive(side.seed(), program_id)?;
    if address != *accounts.vault.key {
        return Err(EscrowError::DerivationMismatch.into());
    }
    if *accounts.mint.owner != spl_token::id() {
        return Err(ProgramError::IncorrectProgramId);
    }

    let rent = &Rent::from_account_info(accounts.rent_sysvar)?;
    create_pda_account(
        accounts.payer,
        accounts.vault,
        accounts.system_program,
        rent,
        TokenAccount::LEN,
        &spl_token::id(),
        &[side.seed(), &[bump]],
    )?;

    let init_vault_ix = spl_token::instruction::initialize_account(
        accounts.token_program.key,
        accounts.vault.key,
        accounts.mint.key,
        accounts.authority.key,
    )?;
    msg!("Calling the token program to initialize vault {:?}...", side);
    invoke(
        &init_vault_ix,
        &[
            accounts.vault.clone(),
            accounts.mint.clone(),
            accounts.authority.clone(),
            accounts.rent_sysvar.clone(),
            accounts.token_program.clone(),
        ],
    )?;

    Ok(VaultHandle {
        address,
        mint: *accounts.mint.key,
        bump,
    })
}

/// Moves `amount` from the depositor's token account into the vault.
pub fn deposit<'a>(
    token_program: &AccountInfo<'a>,
    source: &AccountInfo<'a>,
    vault: &AccountInfo<'a>,
    depositor: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    if amount == 0 {
        return Err(EscrowError::InvalidAmount.into());
    }
    let source_info = TokenAccount::unpack(&source.data.borrow())?;
    if source_info.amount < amount {
        return Err(EscrowError::InsufficientFunds.into());
    }

    let transfer_to_vault_ix = spl_token::instruction::transfer(
        token_program.key,
        source.key,
        vault.key,
        depositor.key,
        &[],
        amount,
    )?;
    msg!("Calling the token program to transfer tokens into the vault...");
    invoke(
        &transfer_to_vault_ix,
        &[
            source.clone(),
            vault.clone(),
            depositor.clone(),
            token_program.clone(),
        ],
    )
}

/// Pays `amount` out of the vault, signed by the escrow record's seeds.
pub(crate) fn release<'a>(
    token_program: &AccountInfo<'a>,
    vault: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    amount: u64,
    authority_seeds: &[&[u8]],
) -> ProgramResult {
    let transfer_out_ix = spl_token::instruction::transfer(
        token_program.key,
        vault.key,
        destination.key,
        authority.key,
        &[],
        amount,
    )?;
    msg!("Calling the token program to release tokens from the vault...");
    invoke_signed(
        &transfer_out_ix,
        &[
            vault.clone(),
            destination.clone(),
            authority.clone(),
            token_program.clone(),
        ],
        &[authority_seeds],
    )
}

pub fn balance(vault: &AccountInfo) -> Result<u64, ProgramError> {
    if *vault.owner != spl_token::id() {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(TokenAccount::unpack(&vault.data.borrow())?.amount)
}

/// Checks that `account` is a token account of `mint` owned by `owner`.
pub fn check_token_account(account: &AccountInfo, mint: &Pubkey, owner: &Pubkey) -> ProgramResult {
    if *account.owner != spl_token::id() {
        return Err(ProgramError::IncorrectProgramId);
    }
    let token_account = TokenAccount::unpack(&account.data.borrow())?;
    if token_account.mint != *mint || token_account.owner != *owner {
        return Err(EscrowError::InvalidTokenAccount.into());
    }
    Ok(())
}

/// Allocates `space` bytes owned by `owner` at a derived address.
///
/// A derived address may already hold lamports, in which case
/// `create_account` would fail; top it up, then allocate and assign instead.
pub(crate) fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    new_account: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    rent: &Rent,
    space: usize,
    owner: &Pubkey,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let required_lamports = rent
        .minimum_balance(space)
        .max(1)
        .saturating_sub(new_account.lamports());

    if new_account.lamports() == 0 {
        return invoke_signed(
            &system_instruction::create_account(
                payer.key,
                new_account.key,
                required_lamports,
                space as u64,
                owner,
            ),
            &[payer.clone(), new_account.clone(), system_program.clone()],
            &[signer_seeds],
        );
    }

    if required_lamports > 0 {
        invoke(
            &system_instruction::transfer(payer.key, new_account.key, required_lamports),
            &[payer.clone(), new_account.clone(), system_program.clone()],
        )?;
    }
    invoke_signed(
        &system_instruction::allocate(new_account.key, space as u64),
        &[new_account.clone(), system_program.clone()],
        &[signer_seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(new_account.key, owner),
        &[new_account.clone(), system_program.clone()],
        &[signer_seeds],
    )
}
