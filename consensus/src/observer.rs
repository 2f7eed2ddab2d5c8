//! The observer key set and its finalization quorum.

use std::collections::BTreeSet;

use pof_crypto::{hash_of, recover_signer, sign_hash};
use pof_types::{BlockSign, KeyPair, PublicHash, Signature};

use crate::ConsensusError;

/// Public hashes of the configured observers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObserverSet {
    keys: BTreeSet<PublicHash>,
}

/// Sign a block for finalization. Observers sign the hash of the
/// [`BlockSign`], binding the header and the generator's signature together.
pub fn observer_sign(block_sign: &BlockSign, keypair: &KeyPair) -> Signature {
    sign_hash(&hash_of(block_sign), keypair)
}

impl ObserverSet {
    pub fn new(keys: impl IntoIterator<Item = PublicHash>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &PublicHash) -> bool {
        self.keys.contains(key)
    }

    /// Signatures needed to finalize: a strict majority.
    pub fn quorum(&self) -> usize {
        self.keys.len() / 2 + 1
    }

    /// Check that `signatures` are valid finalization signatures over
    /// `block_sign` from distinct observers, and that they reach the quorum.
    pub fn verify(&self, block_sign: &BlockSign, signatures: &[Signature]) -> Result<(), ConsensusError> {
        let hash = hash_of(block_sign);
        let mut seen = BTreeSet::new();
        for sig in signatures {
            let signer = recover_signer(&hash, sig).map_err(|_| ConsensusError::InvalidSignature)?;
            if !self.keys.contains(&signer) {
                return Err(ConsensusError::NotObserver);
            }
            if !seen.insert(signer) {
                return Err(ConsensusError::DuplicateObserverSignature);
            }
        }
        if seen.len() < self.quorum() {
            return Err(ConsensusError::InsufficientObserverSignatures {
                have: seen.len(),
                need: self.quorum(),
            });
        }
        Ok(())
    }
}
