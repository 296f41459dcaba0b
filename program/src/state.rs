use solana_program::{
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};

use crate::{
    error::EscrowError,
    pda,
    vault::{VaultHandle, VaultSide},
};

/// Protocol progress of an escrow record. Ordinals only ever increase.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum EscrowState {
    #[default]
    Uninitialized = 0,
    FundedA = 1,
    FundedBoth = 2,
    Settled = 3,
    Cancelled = 4,
}

impl EscrowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EscrowState::Settled | EscrowState::Cancelled)
    }
}

impl TryFrom<u8> for EscrowState {
    type Error = ProgramError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EscrowState::Uninitialized),
            1 => Ok(EscrowState::FundedA),
            2 => Ok(EscrowState::FundedBoth),
            3 => Ok(EscrowState::Settled),
            4 => Ok(EscrowState::Cancelled),
            _ => Err(ProgramError::InvalidAccountData),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BumpSeeds {
    pub escrow: u8,
    pub vault_x: u8,
    pub vault_y: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Party {
    A,
    B,
}

/// One vault payout a settle or cancel transition asks the processor to make.
///
/// The processor empties the whole vault into `to`; `amount` is the recorded
/// deposit the vault must hold at least.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Release {
    pub vault: VaultSide,
    pub to: Party,
    pub amount: u64,
}

/// Everything `initialize` writes into a fresh record.
#[derive(Clone, Copy, Debug)]
pub struct InitParams {
    pub party_a: Pubkey,
    pub party_b: Pubkey,
    pub escrow_bump: u8,
    pub vault_x: VaultHandle,
    pub vault_y: VaultHandle,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EscrowRecord {
    pub is_initialized: bool,
    pub state: EscrowState,
    pub party_a: Pubkey,
    pub party_b: Pubkey,
    pub token_x_mint: Pubkey,
    pub token_y_mint: Pubkey,
    pub vault_x: Pubkey,
    pub vault_y: Pubkey,
    pub amount_a: u64,
    pub amount_b: u64,
    pub bump_seeds: BumpSeeds,
}

impl EscrowRecord {
    pub fn initialize(&mut self, params: InitParams) -> Result<(), EscrowError> {
        if self.is_initialized {
            return Err(EscrowError::AlreadyInitialized);
        }
        if params.party_a == params.party_b {
            return Err(EscrowError::SameParty);
        }
        if params.vault_x.mint == params.vault_y.mint {
            return Err(EscrowError::SameMint);
        }

        *self = EscrowRecord {
            is_initialized: true,
            state: EscrowState::Uninitialized,
            party_a: params.party_a,
            party_b: params.party_b,
            token_x_mint: params.vault_x.mint,
            token_y_mint: params.vault_y.mint,
            vault_x: params.vault_x.address,
            vault_y: params.vault_y.address,
            amount_a: 0,
            amount_b: 0,
            bump_seeds: BumpSeeds {
                escrow: params.escrow_bump,
                vault_x: params.vault_x.bump,
                vault_y: params.vault_y.bump,
            },
        };
        Ok(())
    }

    pub fn fund_a(&mut self, caller: &Pubkey, amount: u64) -> Result<(), EscrowError> {
        self.require_initialized()?;
        if *caller != self.party_a {
            return Err(EscrowError::Unauthorized);
        }
        self.require_state(EscrowState::Uninitialized)?;
        if amount == 0 {
            return Err(EscrowError::InvalidAmount);
        }

        self.amount_a = amount;
        self.advance(EscrowState::FundedA)
    }

    pub fn fund_b(&mut self, caller: &Pubkey, amount: u64) -> Result<(), EscrowError> {
        self.require_initialized()?;
        if *caller != self.party_b {
            return Err(EscrowError::Unauthorized);
        }
        self.require_state(EscrowState::FundedA)?;
        if amount == 0 {
            return Err(EscrowError::InvalidAmount);
        }

        self.amount_b = amount;
        self.advance(EscrowState::FundedBoth)
    }

    /// Swaps the deposits: B gets A's X, A gets B's Y.
    pub fn settle(&mut self, caller: &Pubkey) -> Result<[Release; 2], EscrowError> {
        self.require_initialized()?;
        self.party_of(caller)?;
        self.require_state(EscrowState::FundedBoth)?;

        let releases = [
            Release {
                vault: VaultSide::X,
                to: Party::B,
                amount: self.deposited(VaultSide::X),
            },
            Release {
                vault: VaultSide::Y,
                to: Party::A,
                amount: self.deposited(VaultSide::Y),
            },
        ];
        self.advance(EscrowState::Settled)?;
        Ok(releases)
    }

    /// Hands vault X back to A and vault Y back to B, each with whatever has
    /// been deposited so far (possibly nothing).
    ///
    /// With nothing deposited either party may walk away. Once A has funded,
    /// only A may cancel until B funds too.
    pub fn cancel(&mut self, caller: &Pubkey) -> Result<[Release; 2], EscrowError> {
        self.require_initialized()?;
        let party = self.party_of(caller)?;
        if self.state.is_terminal() {
            return Err(EscrowError::InvalidState);
        }
        if self.state == EscrowState::FundedA && party != Party::A {
            return Err(EscrowError::Unauthorized);
        }

        let releases = [
            Release {
                vault: VaultSide::X,
                to: Party::A,
                amount: self.deposited(VaultSide::X),
            },
            Release {
                vault: VaultSide::Y,
                to: Party::B,
                amount: self.deposited(VaultSide::Y),
            },
        ];
        self.advance(EscrowState::Cancelled)?;
        Ok(releases)
    }

    pub fn party_key(&self, party: Party) -> &Pubkey {
        match party {
            Party::A => &self.party_a,
            Party::B => &self.party_b,
        }
    }

    pub fn vault_key(&self, side: VaultSide) -> &Pubkey {
        match side {
            VaultSide::X => &self.vault_x,
            VaultSide::Y => &self.vault_y,
        }
    }

    pub fn mint_key(&self, side: VaultSide) -> &Pubkey {
        match side {
            VaultSide::X => &self.token_x_mint,
            VaultSide::Y => &self.token_y_mint,
        }
    }

    /// Amount the vault on `side` is expected to hold right now.
    fn deposited(&self, side: VaultSide) -> u64 {
        if self.state.is_terminal() {
            return 0;
        }
        match side {
            VaultSide::X if self.state >= EscrowState::FundedA => self.amount_a,
            VaultSide::Y if self.state >= EscrowState::FundedBoth => self.amount_b,
            _ => 0,
        }
    }

    /// Checks `address` against the stored vault key and re-derives it with the stored bump.
    pub fn verify_vault(
        &self,
        side: VaultSide,
        address: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<(), EscrowError> {
        if address != self.vault_key(side) {
            return Err(EscrowError::DerivationMismatch);
        }
        let bump = match side {
            VaultSide::X => self.bump_seeds.vault_x,
            VaultSide::Y => self.bump_seeds.vault_y,
        };
        pda::verify(side.seed(), bump, program_id, address)
    }

    fn party_of(&self, caller: &Pubkey) -> Result<Party, EscrowError> {
        if *caller == self.party_a {
            Ok(Party::A)
        } else if *caller == self.party_b {
            Ok(Party::B)
        } else {
            Err(EscrowError::Unauthorized)
        }
    }

    fn require_initialized(&self) -> Result<(), EscrowError> {
        if !self.is_initialized {
            return Err(EscrowError::InvalidState);
        }
        Ok(())
    }

    fn require_state(&self, expected: EscrowState) -> Result<(), EscrowError> {
        if self.state != expected {
            return Err(EscrowError::InvalidState);
        }
        Ok(())
    }

    fn advance(&mut self, next: EscrowState) -> Result<(), EscrowError> {
        if next <= self.state {
            return Err(EscrowError::InvalidState);
        }
        self.state = next;
        Ok(())
    }
}

impl Sealed for EscrowRecord {}

impl IsInitialized for EscrowRecord {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for EscrowRecord {
    const LEN: usize = 213;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, EscrowRecord::LEN];
        let (
            is_initialized,
            state,
            party_a,
            party_b,
            token_x_mint,
            token_y_mint,
            vault_x,
            vault_y,
            amount_a,
            amount_b,
            bump_seeds,
        ) = array_refs![src, 1, 1, 32, 32, 32, 32, 32, 32, 8, 8, 3];
        let is_initialized = match is_initialized {
            [0] => false,
            [1] => true,
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(EscrowRecord {
            is_initialized,
            state: EscrowState::try_from(state[0])?,
            party_a: Pubkey::new_from_array(*party_a),
            party_b: Pubkey::new_from_array(*party_b),
            token_x_mint: Pubkey::new_from_array(*token_x_mint),
            token_y_mint: Pubkey::new_from_array(*token_y_mint),
            vault_x: Pubkey::new_from_array(*vault_x),
            vault_y: Pubkey::new_from_array(*vault_y),
            amount_a: u64::from_le_bytes(*amount_a),
            amount_b: u64::from_le_bytes(*amount_b),
            bump_seeds: BumpSeeds {
                escrow: bump_seeds[0],
                vault_x: bump_seeds[1],
                vault_y: bump_seeds[2],
            },
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, EscrowRecord::LEN];
        let (
            is_initialized_dst,
            state_dst,
            party_a_dst,
            party_b_dst,
            token_x_mint_dst,
            token_y_mint_dst,
            vault_x_dst,
            vault_y_dst,
            amount_a_dst,
            amount_b_dst,
            bump_seeds_dst,
        ) = mut_array_refs![dst, 1, 1, 32, 32, 32, 32, 32, 32, 8, 8, 3];

        is_initialized_dst[0] = self.is_initialized as u8;
        state_dst[0] = self.state as u8;
        party_a_dst.copy_from_slice(self.party_a.as_ref());
        party_b_dst.copy_from_slice(self.party_b.as_ref());
        token_x_mint_dst.copy_from_slice(self.token_x_mint.as_ref());
        token_y_mint_dst.copy_from_slice(self.token_y_mint.as_ref());
        vault_x_dst.copy_from_slice(self.vault_x.as_ref());
        vault_y_dst.copy_from_slice(self.vault_y.as_ref());
        *amount_a_dst = self.amount_a.to_le_bytes();
        *amount_b_dst = self.amount_b.to_le_bytes();
        *bump_seeds_dst = [
            self.bump_seeds.escrow,
            self.bump_seeds.vault_x,
            self.bump_seeds.vault_y,
        ];
    }
}
