//! A block: header, transactions with their signatures, and the observer
//! signatures that finalize it.

use pof_crypto::hash_of;
use pof_types::{Hash256, Header, Signature};
use serde::{Deserialize, Serialize};

use crate::Transaction;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    /// Signatures of each transaction, parallel to `transactions`.
    pub transaction_signatures: Vec<Vec<Signature>>,
    /// Finalization signatures: the generator's first, then the observers'.
    pub signatures: Vec<Signature>,
}

impl Block {
    pub fn new(header: Header) -> Self {
        Self {
            header,
            transactions: Vec::new(),
            transaction_signatures: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// The block hash is the hash of its header.
    pub fn hash(&self) -> Hash256 {
        hash_of(&self.header)
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn transaction_hashes(&self) -> Vec<Hash256> {
        let chain_id = self.header.chain_id;
        self.transactions.iter().map(|tx| tx.hash(chain_id)).collect()
    }
}
