use solana_program::pubkey::Pubkey;

use crate::{error::EscrowError, pda, vault::VaultSide};

/// The parties, mints and program an escrow is built around.
///
/// Client code passes one of these into every instruction builder instead of
/// keeping keys in globals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscrowConfig {
    pub program_id: Pubkey,
    pub party_a: Pubkey,
    pub party_b: Pubkey,
    /// Token deposited by party A.
    pub mint_x: Pubkey,
    /// Token deposited by party B.
    pub mint_y: Pubkey,
}

impl EscrowConfig {
    /// Config for the deployed program id.
    pub fn new(party_a: Pubkey, party_b: Pubkey, mint_x: Pubkey, mint_y: Pubkey) -> Self {
        EscrowConfig {
            program_id: crate::id(),
            party_a,
            party_b,
            mint_x,
            mint_y,
        }
    }

    pub fn with_program_id(self, program_id: Pubkey) -> Self {
        EscrowConfig { program_id, ..self }
    }

    pub fn escrow_address(&self) -> Result<Pubkey, EscrowError> {
        pda::escrow_address(&self.program_id).map(|(address, _)| address)
    }

    pub fn vault_address(&self, side: VaultSide) -> Result<Pubkey, EscrowError> {
        pda::derive(side.seed(), &self.program_id).map(|(address, _)| address)
    }

    pub fn mint(&self, side: VaultSide) -> &Pubkey {
        match side {
            VaultSide::X => &self.mint_x,
            VaultSide::Y => &self.mint_y,
        }
    }
}
