//! Program-derived addresses for the escrow record and its two vaults.
//!
//! Every address is computed from one fixed seed plus a bump byte under the
//! program id. The bump search is bounded: 256 candidates, highest first.

use solana_program::pubkey::{Pubkey, PubkeyError, MAX_SEED_LEN};

use crate::error::EscrowError;

pub const ESCROW_SEED: &[u8] = b"escrow";
pub const VAULT_X_SEED: &[u8] = b"x_vault";
pub const VAULT_Y_SEED: &[u8] = b"y_vault";

/// Finds the first off-curve address for `seed`, trying bumps 255 down to 0.
pub fn derive(seed: &[u8], program_id: &Pubkey) -> Result<(Pubkey, u8), EscrowError> {
    if seed.len() > MAX_SEED_LEN {
        return Err(EscrowError::DerivationExhausted);
    }
    for bump in (0..=u8::MAX).rev() {
        match Pubkey::create_program_address(&[seed, &[bump]], program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(PubkeyError::InvalidSeeds) => continue,
            Err(_) => return Err(EscrowError::DerivationExhausted),
        }
    }
    Err(EscrowError::DerivationExhausted)
}

/// Recomputes the address for `seed` with a known bump and compares it.
pub fn verify(
    seed: &[u8],
    bump: u8,
    program_id: &Pubkey,
    address: &Pubkey,
) -> Result<(), EscrowError> {
    let expected = Pubkey::create_program_address(&[seed, &[bump]], program_id)
        .map_err(|_| EscrowError::DerivationMismatch)?;
    if expected != *address {
        return Err(EscrowError::DerivationMismatch);
    }
    Ok(())
}

pub fn escrow_address(program_id: &Pubkey) -> Result<(Pubkey, u8), EscrowError> {
    derive(ESCROW_SEED, program_id)
}

pub fn vault_x_address(program_id: &Pubkey) -> Result<(Pubkey, u8), EscrowError> {
    derive(VAULT_X_SEED, program_id)
}

pub fn vault_y_address(program_id: &Pubkey) -> Result<(Pubkey, u8), EscrowError> {
    derive(VAULT_Y_SEED, program_id)
}
