use pof_state::StateError;
use pof_types::{Address, TypeError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("invalid sequence for {address}: expected {expected}, got {got}")]
    InvalidSequence { address: Address, expected: u64, got: u64 },

    #[error("invalid transaction signature")]
    InvalidSignature,

    #[error("signer rejected: {0}")]
    Signer(String),

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("cannot transfer to the sending account")]
    SelfTransfer,

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("account is not a formulator: {0}")]
    NotFormulator(Address),

    #[error("corrupt process data: {0}")]
    CorruptData(String),

    #[error(transparent)]
    State(#[from] StateError),
}

impl From<TypeError> for TransactionError {
    fn from(e: TypeError) -> Self {
        TransactionError::Signer(e.to_string())
    }
}
