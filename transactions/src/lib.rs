//! Transactions of the Proof-of-Formulation chain and the blocks carrying them.
//!
//! Each process module owns a closed set of transaction variants:
//! - **vault**: account creation and balance transfers
//! - **formulator**: formulator registration and revocation, feeding the rank schedule
//!
//! [`Transaction`] dispatches the shared validate/execute contract by exhaustive match.

pub mod block;
pub mod error;
pub mod formulator;
pub mod vault;

pub use block::Block;
pub use error::TransactionError;
pub use formulator::{FormulatorTx, RankChange};
pub use vault::VaultTx;

use pof_crypto::{hash_of, recover_signer};
use pof_state::Context;
use pof_types::{Address, Hash256, PublicHash, Signature, Timestamp, FORMULATOR_PID, VAULT_PID};
use serde::{Deserialize, Serialize};

/// The unified transaction enum wrapping every process's transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Vault(VaultTx),
    Formulator(FormulatorTx),
}

impl Transaction {
    /// Id of the owning process.
    pub fn pid(&self) -> u8 {
        match self {
            Self::Vault(_) => VAULT_PID,
            Self::Formulator(_) => FORMULATOR_PID,
        }
    }

    /// Process id in the high byte, variant in the low byte.
    pub fn type_id(&self) -> u16 {
        let kind = match self {
            Self::Vault(tx) => tx.kind(),
            Self::Formulator(tx) => tx.kind(),
        };
        (u16::from(self.pid()) << 8) | u16::from(kind)
    }

    /// The account that signs and pays for this transaction.
    pub fn from(&self) -> &Address {
        match self {
            Self::Vault(tx) => tx.from(),
            Self::Formulator(tx) => tx.from(),
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            Self::Vault(tx) => tx.seq(),
            Self::Formulator(tx) => tx.seq(),
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Vault(tx) => tx.timestamp(),
            Self::Formulator(tx) => tx.timestamp(),
        }
    }

    /// Hash binding the transaction to a chain and its type.
    pub fn hash(&self, chain_id: u8) -> Hash256 {
        hash_of(&(chain_id, self.type_id(), self))
    }

    /// Check the transaction against the context without changing it.
    ///
    /// The sequence must be exactly one past the sender's committed sequence
    /// and the signers must control the sending account.
    pub fn validate(&self, ctx: &mut Context, signers: &[PublicHash]) -> Result<(), TransactionError> {
        let from = *self.from();
        let expected = ctx.seq(&from)? + 1;
        if self.seq() != expected {
            return Err(TransactionError::InvalidSequence {
                address: from,
                expected,
                got: self.seq(),
            });
        }
        let account = ctx.account(&from)?;
        account.validate_signers(signers)?;

        match self {
            Self::Vault(tx) => tx.validate(ctx),
            Self::Formulator(tx) => tx.validate(ctx),
        }
    }

    /// Apply the transaction at position `index` of the block being executed
    /// and advance the sender's sequence.
    pub fn execute(&self, ctx: &mut Context, index: u16) -> Result<(), TransactionError> {
        match self {
            Self::Vault(tx) => tx.execute(ctx, index)?,
            Self::Formulator(tx) => tx.execute(ctx, index)?,
        }
        ctx.add_seq(self.from())?;
        Ok(())
    }
}

/// Verify every signature over the transaction hash and return the signers' hashes.
pub fn recover_signers(
    tx_hash: &Hash256,
    signatures: &[Signature],
) -> Result<Vec<PublicHash>, TransactionError> {
    signatures
        .iter()
        .map(|sig| recover_signer(tx_hash, sig).map_err(|_| TransactionError::InvalidSignature))
        .collect()
}
