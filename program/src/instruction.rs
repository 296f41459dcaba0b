use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program, sysvar,
};

use crate::{config::EscrowConfig, error::EscrowError, vault::VaultSide};

/// Bumped whenever any account layout below changes order or flags.
pub const ACCOUNT_LAYOUT_VERSION: u8 = 1;

/// Instructions are Borsh-encoded: one tag byte, then fixed-width LE fields.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscrowInstruction {
    /// Creates the escrow record and both vaults at their derived addresses.
    ///
    /// The record lives at a fixed seed and this instruction needs no prior
    /// authorization, so whoever initializes first owns the deployment's
    /// single escrow. Later attempts fail with `AlreadyInitialized`.
    ///
    /// Accounts: see [`INITIALIZE_ACCOUNTS`].
    Initialize,
    /// Party A deposits `amount` of token X into vault X.
    ///
    /// Accounts: see [`FUND_A_ACCOUNTS`].
    FundA { amount: u64 },
    /// Party B deposits `amount` of token Y into vault Y.
    ///
    /// Accounts: see [`FUND_B_ACCOUNTS`].
    FundB { amount: u64 },
    /// Either party swaps the two vaults: X to party B, Y to party A.
    ///
    /// Accounts: see [`SETTLE_ACCOUNTS`].
    Settle,
    /// Returns vault X to party A and vault Y to party B.
    ///
    /// Accounts: see [`CANCEL_ACCOUNTS`].
    Cancel,
}

impl EscrowInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| EscrowError::InvalidInstruction.into())
    }

    pub fn account_layout(&self) -> &'static [AccountSlot] {
        match self {
            Self::Initialize => INITIALIZE_ACCOUNTS,
            Self::FundA { .. } => FUND_A_ACCOUNTS,
            Self::FundB { .. } => FUND_B_ACCOUNTS,
            Self::Settle => SETTLE_ACCOUNTS,
            Self::Cancel => CANCEL_ACCOUNTS,
        }
    }
}

/// One position in an instruction's account list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountSlot {
    pub name: &'static str,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountSlot {
    const fn readonly(name: &'static str) -> Self {
        AccountSlot {
            name,
            is_signer: false,
            is_writable: false,
        }
    }

    const fn writable(name: &'static str) -> Self {
        AccountSlot {
            name,
            is_signer: false,
            is_writable: true,
        }
    }

    const fn signer(name: &'static str) -> Self {
        AccountSlot {
            name,
            is_signer: true,
            is_writable: false,
        }
    }

    const fn writable_signer(name: &'static str) -> Self {
        AccountSlot {
            name,
            is_signer: true,
            is_writable: true,
        }
    }

    pub fn meta(&self, pubkey: Pubkey) -> AccountMeta {
        if self.is_writable {
            AccountMeta::new(pubkey, self.is_signer)
        } else {
            AccountMeta::new_readonly(pubkey, self.is_signer)
        }
    }
}

pub const INITIALIZE_ACCOUNTS: &[AccountSlot] = &[
    AccountSlot::writable("escrow"),
    // pays rent for the record and both vaults
    AccountSlot::writable_signer("party_a"),
    AccountSlot::readonly("party_b"),
    AccountSlot::writable("vault_x"),
    AccountSlot::writable("vault_y"),
    AccountSlot::readonly("mint_x"),
    AccountSlot::readonly("mint_y"),
    AccountSlot::readonly("token_program"),
    AccountSlot::readonly("system_program"),
    AccountSlot::readonly("rent"),
];

pub const FUND_A_ACCOUNTS: &[AccountSlot] = &[
    AccountSlot::writable("escrow"),
    AccountSlot::signer("party_a"),
    AccountSlot::writable("party_a_x_account"),
    AccountSlot::writable("vault_x"),
    AccountSlot::readonly("mint_x"),
    AccountSlot::readonly("token_program"),
];

pub const FUND_B_ACCOUNTS: &[AccountSlot] = &[
    AccountSlot::writable("escrow"),
    AccountSlot::signer("party_b"),
    AccountSlot::writable("party_b_y_account"),
    AccountSlot::writable("vault_y"),
    AccountSlot::readonly("mint_y"),
    AccountSlot::readonly("token_program"),
];

pub const SETTLE_ACCOUNTS: &[AccountSlot] = &[
    AccountSlot::writable("escrow"),
    AccountSlot::signer("caller"),
    AccountSlot::writable("party_a_y_account"),
    AccountSlot::writable("party_b_x_account"),
    AccountSlot::writable("vault_x"),
    AccountSlot::writable("vault_y"),
    AccountSlot::readonly("token_program"),
];

pub const CANCEL_ACCOUNTS: &[AccountSlot] = &[
    AccountSlot::writable("escrow"),
    AccountSlot::signer("caller"),
    AccountSlot::writable("party_a_x_account"),
    AccountSlot::writable("party_b_y_account"),
    AccountSlot::writable("vault_x"),
    AccountSlot::writable("vault_y"),
    AccountSlot::readonly("token_program"),
];

fn build(
    program_id: &Pubkey,
    instruction: EscrowInstruction,
    keys: &[Pubkey],
) -> Result<Instruction, ProgramError> {
    let layout = instruction.account_layout();
    if keys.len() != layout.len() {
        return Err(ProgramError::NotEnoughAccountKeys);
    }
    let accounts = layout
        .iter()
        .zip(keys)
        .map(|(slot, key)| slot.meta(*key))
        .collect();

    let data = borsh::to_vec(&instruction).map_err(|_| EscrowError::InvalidInstruction)?;

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

pub fn initialize(config: &EscrowConfig) -> Result<Instruction, ProgramError> {
    build(
        &config.program_id,
        EscrowInstruction::Initialize,
        &[
            config.escrow_address()?,
            config.party_a,
            config.party_b,
            config.vault_address(VaultSide::X)?,
            config.vault_address(VaultSide::Y)?,
            config.mint_x,
            config.mint_y,
            spl_token::id(),
            system_program::id(),
            sysvar::rent::id(),
        ],
    )
}

/// `party_a_x_account` is the token X account the deposit is drawn from.
pub fn fund_a(
    config: &EscrowConfig,
    party_a_x_account: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    build(
        &config.program_id,
        EscrowInstruction::FundA { amount },
        &[
            config.escrow_address()?,
            config.party_a,
            *party_a_x_account,
            config.vault_address(VaultSide::X)?,
            *config.mint(VaultSide::X),
            spl_token::id(),
        ],
    )
}

/// `party_b_y_account` is the token Y account the deposit is drawn from.
pub fn fund_b(
    config: &EscrowConfig,
    party_b_y_account: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    build(
        &config.program_id,
        EscrowInstruction::FundB { amount },
        &[
            config.escrow_address()?,
            config.party_b,
            *party_b_y_account,
            config.vault_address(VaultSide::Y)?,
            *config.mint(VaultSide::Y),
            spl_token::id(),
        ],
    )
}

pub fn settle(
    config: &EscrowConfig,
    caller: &Pubkey,
    party_a_y_account: &Pubkey,
    party_b_x_account: &Pubkey,
) -> Result<Instruction, ProgramError> {
    build(
        &config.program_id,
        EscrowInstruction::Settle,
        &[
            config.escrow_address()?,
            *caller,
            *party_a_y_account,
            *party_b_x_account,
            config.vault_address(VaultSide::X)?,
            config.vault_address(VaultSide::Y)?,
            spl_token::id(),
        ],
    )
}

pub fn cancel(
    config: &EscrowConfig,
    caller: &Pubkey,
    party_a_x_account: &Pubkey,
    party_b_y_account: &Pubkey,
) -> Result<Instruction, ProgramError> {
    build(
        &config.program_id,
        EscrowInstruction::Cancel,
        &[
            config.escrow_address()?,
            *caller,
            *party_a_x_account,
            *party_b_y_account,
            config.vault_address(VaultSide::X)?,
            config.vault_address(VaultSide::Y)?,
            spl_token::id(),
        ],
    )
}
