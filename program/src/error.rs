use num_derive::FromPrimitive;
use thiserror::Error;

use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError,
    program_error::ProgramError,
};

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum EscrowError {
    /// Instruction data could not be decoded
    #[error("Invalid Instruction")]
    InvalidInstruction = 0,
    #[error("Invalid State")]
    InvalidState = 1,
    /// Caller is not the party this transition requires
    #[error("Unauthorized")]
    Unauthorized = 2,
    #[error("Invalid Amount")]
    InvalidAmount = 3,
    #[error("Insufficient Funds")]
    InsufficientFunds = 4,
    /// Supplied address does not match the recomputed derived address
    #[error("Derivation Mismatch")]
    DerivationMismatch = 5,
    #[error("Already Initialized")]
    AlreadyInitialized = 6,
    #[error("Derivation Exhausted")]
    DerivationExhausted = 7,
    #[error("Same Party")]
    SameParty = 8,
    #[error("Same Mint")]
    SameMint = 9,
    #[error("Mint Mismatch")]
    MintMismatch = 10,
    /// Token account has the wrong mint or owner
    #[error("Invalid Token Account")]
    InvalidTokenAccount = 11,
    #[error("Account Not Writable")]
    AccountNotWritable = 12,
    /// Vault holds less than the deposit recorded for it
    #[error("Vault Balance Mismatch")]
    VaultBalanceMismatch = 13,
}

impl From<EscrowError> for ProgramError {
    fn from(e: EscrowError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for EscrowError {
    fn type_of() -> &'static str {
        "EscrowError"
    }
}

impl PrintProgramError for EscrowError {
    fn print<E>(&self)
    where
        E: 'static + std::error::Error + DecodeError<E> + PrintProgramError + num_traits::FromPrimitive,
    {
        msg!("Error: {}", self);
    }
}
