//! Two-party token swap escrow.
//!
//! Alice deposits token X, Bob deposits token Y, both into vaults at
//! program-derived addresses whose token authority is the escrow record's
//! derived address. Settlement hands each party the other's deposit;
//! cancellation hands each deposit back to whoever made it.

pub mod config;
pub mod error;
pub mod instruction;
pub mod pda;
pub mod processor;
pub mod state;
pub mod vault;

use solana_program::{
    account_info::AccountInfo, entrypoint::ProgramResult, program_error::PrintProgramError,
    pubkey::Pubkey,
};

use crate::{error::EscrowError, processor::Processor};

solana_program::declare_id!("A4vEBwVMoEZ8j4gthtMnm3MLgKtZoSrw7kYGq4KotE2Q");

#[cfg(not(feature = "no-entrypoint"))]
solana_program::entrypoint!(process_instruction);

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    if let Err(error) = Processor::process(program_id, accounts, instruction_data) {
        error.print::<EscrowError>();
        return Err(error);
    }
    Ok(())
}
