//! Errors raised by type-level validation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid signer count: expected {expected}, got {got}")]
    InvalidSignerCount { expected: usize, got: usize },

    #[error("signer is not the account key")]
    InvalidAccountSigner,
}
