use pof_types::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] pof_ledger::LedgerError),

    #[error("network error: {0}")]
    Network(#[from] pof_network::NetworkError),

    #[error("consensus error: {0}")]
    Consensus(#[from] pof_consensus::ConsensusError),

    #[error("store error: {0}")]
    Store(#[from] pof_store::StoreError),

    #[error("state error: {0}")]
    State(#[from] pof_state::StateError),

    #[error("transaction error: {0}")]
    Transaction(#[from] pof_transactions::TransactionError),

    #[error("message error: {0}")]
    Message(#[from] pof_messages::MessageError),

    /// A block request failed authentication. Not retried.
    #[error("invalid block request: {0}")]
    InvalidRequest(&'static str),

    #[error("unexpected {0} message")]
    UnexpectedMessage(&'static str),

    #[error("transaction pool is full")]
    TxPoolFull,

    #[error("transaction already in pool")]
    TxExists,

    #[error("no connected formulator {0}")]
    UnknownFormulator(Address),

    /// A fork was detected; the node no longer accepts work.
    #[error("node halted")]
    Halted,

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
