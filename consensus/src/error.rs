use pof_state::StateError;
use pof_types::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("invalid rank for timeout count {0}")]
    InvalidRank(u32),

    #[error("rank schedule is empty")]
    EmptyRankSchedule,

    #[error("block generated by {got}, expected {expected}")]
    UnexpectedGenerator { expected: Address, got: Address },

    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("consensus data must be a 4-byte timeout count")]
    InvalidConsensusData,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("signer is not an observer")]
    NotObserver,

    #[error("duplicate observer signature")]
    DuplicateObserverSignature,

    #[error("insufficient observer signatures: {have} < {need}")]
    InsufficientObserverSignatures { have: usize, need: usize },

    #[error("corrupt rank schedule: {0}")]
    CorruptSchedule(String),

    #[error(transparent)]
    State(#[from] StateError),
}
