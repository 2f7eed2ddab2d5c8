use pof_consensus::ConsensusError;
use pof_state::StateError;
use pof_store::StoreError;
use pof_transactions::TransactionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// A different block is already committed at this height.
    #[error("found forked block at height {height}")]
    ForkedBlock { height: u32 },

    #[error("block {0} is already connected")]
    AlreadyConnected(u32),

    #[error("invalid height: expected {expected}, got {got}")]
    InvalidHeight { expected: u32, got: u32 },

    #[error("invalid chain id")]
    InvalidChainId,

    #[error("invalid version")]
    InvalidVersion,

    #[error("invalid prev hash")]
    InvalidPrevHash,

    #[error("invalid timestamp")]
    InvalidTimestamp,

    #[error("invalid level root hash")]
    InvalidLevelRootHash,

    #[error("invalid context hash")]
    InvalidContextHash,

    #[error("invalid generator signature")]
    InvalidGeneratorSignature,

    #[error("context does not extend the committed chain")]
    StaleContext,

    #[error("too many transactions: {0}")]
    TooManyTransactions(usize),

    #[error("invalid block: {0}")]
    InvalidBlock(&'static str),

    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LedgerError {
    /// A fork cannot be recovered from; the process must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::ForkedBlock { .. })
    }
}
