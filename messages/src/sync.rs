//! Chain synchronization records.

use pof_transactions::{Block, Transaction};
use pof_types::{Hash256, Signature};
use serde::{Deserialize, Serialize};

/// Most blocks a single [`RequestMessage`] may ask for.
pub const MAX_REQUEST_COUNT: u8 = 10;

/// A peer's committed tip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub version: u16,
    pub height: u32,
    pub last_hash: Hash256,
}

/// Ask for `count` committed blocks starting at `height`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub height: u32,
    pub count: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMessage {
    pub blocks: Vec<Block>,
}

/// Transactions relayed to formulators, each with its signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMessage {
    pub transactions: Vec<Transaction>,
    pub signatures: Vec<Vec<Signature>>,
}
