//! Account model.
//!
//! Account kinds are a closed set; each kind decides which signers may act for it.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::TypeError;
use crate::keys::PublicHash;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub name: String,
    pub kind: AccountKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    /// A plain account controlled by one key.
    Single { key_hash: PublicHash },
    /// An account allowed to generate blocks.
    ///
    /// `key_hash` authorizes transactions for the account; `generator_hash`
    /// is the hash of the key that signs generated blocks and handshakes.
    Formulator {
        key_hash: PublicHash,
        generator_hash: PublicHash,
    },
}

impl Account {
    pub fn single(address: Address, name: impl Into<String>, key_hash: PublicHash) -> Self {
        Self {
            address,
            name: name.into(),
            kind: AccountKind::Single { key_hash },
        }
    }

    pub fn formulator(
        address: Address,
        name: impl Into<String>,
        key_hash: PublicHash,
        generator_hash: PublicHash,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            kind: AccountKind::Formulator {
                key_hash,
                generator_hash,
            },
        }
    }

    pub fn key_hash(&self) -> &PublicHash {
        match &self.kind {
            AccountKind::Single { key_hash } => key_hash,
            AccountKind::Formulator { key_hash, .. } => key_hash,
        }
    }

    pub fn generator_hash(&self) -> Option<&PublicHash> {
        match &self.kind {
            AccountKind::Single { .. } => None,
            AccountKind::Formulator { generator_hash, .. } => Some(generator_hash),
        }
    }

    pub fn is_formulator(&self) -> bool {
        matches!(self.kind, AccountKind::Formulator { .. })
    }

    /// Every account kind is controlled by exactly one key.
    pub fn validate_signers(&self, signers: &[PublicHash]) -> Result<(), TypeError> {
        if signers.len() != 1 {
            return Err(TypeError::InvalidSignerCount {
                expected: 1,
                got: signers.len(),
            });
        }
        if &signers[0] != self.key_hash() {
            return Err(TypeError::InvalidAccountSigner);
        }
        Ok(())
    }
}
