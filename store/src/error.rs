use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("block height {got} does not follow the tip height {height}")]
    InvalidAppendHeight { height: u32, got: u32 },

    #[error("block prev hash does not match the tip")]
    InvalidPrevHash,

    #[error("stored genesis does not match the configured genesis")]
    GenesisMismatch,

    #[error("store has no genesis block")]
    NotInitialized,

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}
